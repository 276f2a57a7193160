use indexmap::{IndexMap, IndexSet};

use super::{Translation, join_lines};

/// Runtime helpers that generated expressions may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryFunction {
    Print,
    Map,
    Filter,
    Find,
}

impl LibraryFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "__print",
            Self::Map => "__map",
            Self::Filter => "__filter",
            Self::Find => "__find",
        }
    }

    pub fn definition(self) -> &'static str {
        match self {
            Self::Print => {
                "func __print(args):\n  var parts = []\n  for arg in args:\n    parts.append(str(arg))\n  print(PoolStringArray(parts).join(\" \"))"
            }
            Self::Map => {
                "func __map(list, f):\n  var result = []\n  for item in list:\n    result.append(f.call_func(item))\n  return result"
            }
            Self::Filter => {
                "func __filter(list, f):\n  var result = []\n  for item in list:\n    if f.call_func(item):\n      result.append(item)\n  return result"
            }
            Self::Find => {
                "func __find(list, f):\n  for item in list:\n    if f.call_func(item):\n      return item\n  return null"
            }
        }
    }

    pub fn for_array_method(method: &str) -> Option<Self> {
        match method {
            "map" => Some(Self::Map),
            "filter" => Some(Self::Filter),
            "find" => Some(Self::Find),
            _ => None,
        }
    }
}

/// Hoisted definitions of one output file, deduplicated in first-use order.
#[derive(Debug, Default)]
pub struct HoistCollector {
    helpers: IndexSet<LibraryFunction>,
    closures: IndexMap<String, String>,
    enums: IndexMap<String, String>,
}

impl HoistCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the hoists out of a translation, leaving its content and files in place.
    pub fn collect(&mut self, translation: &mut Translation) {
        self.helpers
            .extend(std::mem::take(&mut translation.hoisted_helpers));
        for (name, body) in std::mem::take(&mut translation.hoisted_closures) {
            self.closures.entry(name).or_insert(body);
        }
        for (name, body) in std::mem::take(&mut translation.hoisted_enums) {
            self.enums.entry(name).or_insert(body);
        }
    }

    pub fn take_closures(&mut self) -> String {
        join_lines(std::mem::take(&mut self.closures).into_values())
    }

    pub fn render_enums(&self) -> String {
        join_lines(self.enums.values())
    }

    pub fn render_helpers(&self) -> String {
        join_lines(self.helpers.iter().map(|h| h.definition()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_emits_each_key_once_in_first_use_order() {
        let mut collector = HoistCollector::new();

        let mut first = Translation::text("a");
        first.hoisted_helpers.insert(LibraryFunction::Map);
        first
            .hoisted_closures
            .insert("__gen_0".into(), "func __gen_0():\n  pass".into());
        let mut second = Translation::text("b");
        second.hoisted_helpers.insert(LibraryFunction::Print);
        second.hoisted_helpers.insert(LibraryFunction::Map);
        second
            .hoisted_closures
            .insert("__gen_0".into(), "func __gen_0():\n  return 1".into());

        collector.collect(&mut first);
        collector.collect(&mut second);

        let helpers = collector.render_helpers();
        assert!(helpers.starts_with("func __map"));
        assert_eq!(helpers.matches("func __map").count(), 1);
        assert!(helpers.contains("func __print"));
        assert_eq!(collector.take_closures(), "func __gen_0():\n  pass");
        assert!(first.hoisted_helpers.is_empty());
        assert_eq!(first.content, "a");
    }
}
