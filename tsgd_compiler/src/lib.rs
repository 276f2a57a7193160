//! Translation of typed TypeScript game scripts into GDScript.
//!
//! A build parses every unit first, indexes their classes and enums into a
//! [`ProgramIndex`], then lowers each unit against that index.

pub mod ast;
pub mod diagnostics;
pub mod engine_defs;
pub mod error;
pub mod index;
pub mod parser;
pub mod scope;
pub mod source_span;
pub mod translate;
pub mod types;
pub mod units;
pub mod usage;

use std::path::Path;

pub use ast::Module;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::CompileError;
pub use index::ProgramIndex;
pub use parser::{TypeScriptParser, parse_module};
pub use translate::{OutputFile, source_file::UnitOutput};
pub use units::{UnitMap, UnitRef, UnitResolver};

/// Translates one parsed unit against an index of the whole program.
pub fn compile_unit(
    module: &Module,
    index: &ProgramIndex,
    units: &dyn UnitResolver,
) -> Result<UnitOutput, CompileError> {
    let unit = units
        .resolve_unit(&module.path)
        .ok_or_else(|| CompileError::Parse {
            path: module.path.clone(),
            message: "file is not part of the project".into(),
        })?;
    translate::source_file::translate_module(module, &unit, index, units)
}

/// Indexes `modules` together and translates each of them.
pub fn compile_modules(modules: &[Module], units: &dyn UnitResolver) -> Result<Vec<UnitOutput>, CompileError> {
    let index = ProgramIndex::from_modules(modules);
    modules
        .iter()
        .map(|module| compile_unit(module, &index, units))
        .collect()
}

/// Parses and translates a single self-contained source file.
pub fn compile_source(
    path: impl AsRef<Path>,
    source: impl Into<String>,
    units: &dyn UnitResolver,
) -> Result<UnitOutput, CompileError> {
    let module = parse_module(path, source)?;
    let index = ProgramIndex::from_modules([&module]);
    compile_unit(&module, &index, units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> UnitMap {
        UnitMap::new()
            .with_unit("src/main.ts", "out/main.gd", "res://main.gd")
            .with_unit("src/base.ts", "out/base.gd", "res://base.gd")
    }

    fn compile(source: &str) -> UnitOutput {
        compile_source("src/main.ts", source, &units()).unwrap()
    }

    fn script(source: &str) -> String {
        compile(source).files.remove(0).content
    }

    /// Non-blank lines with trailing whitespace removed.
    fn lines(text: &str) -> Vec<String> {
        text.lines()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }

    fn assert_block(output: &str, expected: &str) {
        let output = lines(output).join("\n");
        let expected = lines(expected).join("\n");
        assert!(
            output.contains(&expected),
            "expected block:\n{expected}\n\nin output:\n{output}"
        );
    }

    fn kinds(output: &UnitOutput) -> Vec<DiagnosticKind> {
        output.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn default_class_gets_header_and_exports() {
        let out = script(
            r#"
export default class Player extends Node2D {
  @exports
  speed: int;
  health = 10;
}
"#,
        );
        assert!(out.starts_with("# This file has been autogenerated by tsgd. DO NOT EDIT!\n"));
        assert_block(
            &out,
            "extends Node2D\nclass_name Player",
        );
        assert_block(&out, "export(int) var speed: int\nvar health: int = 10");
    }

    #[test]
    fn continue_repeats_the_loop_increment() {
        let out = script(
            r#"
export default class Counter extends Node {
  run() {
    for (let i = 0; i < 10; i++) {
      if (i == 5) {
        continue;
      }
      print(i);
    }
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
func run():
  var i: int = 0
  while i < 10:
    if i == 5:
      i += 1
      continue
    print(i)
    i += 1
"#,
        );
    }

    #[test]
    fn increments_in_conditions_run_in_both_branches() {
        let out = script(
            r#"
export default class Ticker extends Node {
  tick(x: int) {
    if (x++ > 3) {
      print(x);
    }
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
func tick(x):
  if x > 3:
    print(x)
    x += 1
  else:
    x += 1
"#,
        );
    }

    #[test]
    fn do_while_checks_at_the_end() {
        let out = script(
            r#"
export default class Loop extends Node {
  run() {
    let n = 0;
    do {
      n += 1;
    } while (n < 3);
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
  while true:
    n += 1
    if not (n < 3):
      break
"#,
        );
    }

    #[test]
    fn switch_becomes_match() {
        let out = script(
            r#"
export default class Picker extends Node {
  pick(v: int) {
    switch (v) {
      case 1:
      case 2:
        print("low");
        break;
      default:
        print("other");
    }
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
  match v:
    1, 2:
      print("low")
    _:
      print("other")
"#,
        );
    }

    #[test]
    fn superclass_properties_are_not_redeclared() {
        let out = script(
            r#"
export default class Mover extends Node2D {
  position: Vector2;
  speed = 1.5;
}
"#,
        );
        assert!(!out.contains("var position"));
        assert_block(&out, "var speed: float = 1.5");
    }

    #[test]
    fn enums_become_constant_mappings() {
        let out = script(
            r#"
export enum Mode { Idle, Run = 4, Jump }

export default class Actor extends Node {
  @exports
  mode: Mode = Mode.Idle;
}
"#,
        );
        assert_block(
            &out,
            "const Mode = {\n  \"Idle\": 0,\n  \"Run\": 4,\n  \"Jump\": 5,\n}",
        );
        assert_block(&out, "export(Mode) var mode = Mode.Idle");
    }

    #[test]
    fn export_flags_render_their_names() {
        let out = script(
            r#"
export default class Layers extends Node {
  @export_flags("Fire", "Water")
  element: int = 0;
}
"#,
        );
        assert_block(&out, "export(int, FLAGS, \"Fire\", \"Water\") var element: int = 0");
    }

    #[test]
    fn diagnostics_do_not_stop_the_translation() {
        let out = compile(
            r#"
export default class Emitter extends Node {
  hit: Signal;
  $done: Signal;
  get value() { return 1; }
  ready() {
    print("ok");
  }
}
"#,
        );
        assert_eq!(
            kinds(&out),
            vec![DiagnosticKind::SignalNamingError, DiagnosticKind::UnsupportedSyntax]
        );
        let text = &out.files[0].content;
        assert_block(text, "signal done");
        assert_block(text, "func ready():\n  print(\"ok\")");
        assert!(!text.contains("signal hit"));
    }

    #[test]
    fn autoload_classes_drop_name_and_instance() {
        let out = script(
            r#"
@autoload
export default class Globals extends Node {
  score = 0;
}

export const globals = new Globals();
"#,
        );
        assert!(!out.contains("class_name"));
        assert!(!out.contains("Globals.new()"));
        assert_block(&out, "extends Node\n\nvar score: int = 0");
    }

    #[test]
    fn tool_on_inner_class_is_reported() {
        let out = compile(
            r#"
@tool
export class Helper extends Node {}

export default class Main extends Node {}
"#,
        );
        assert_eq!(kinds(&out), vec![DiagnosticKind::ToolAnnotationOnNonDefaultClass]);
        assert_block(&out.files[0].content, "class Helper extends Node:\n  pass");
    }

    #[test]
    fn multiple_inheritance_is_fatal() {
        let err = compile_source(
            "src/main.ts",
            "export default class Both extends Node, Node2D {}",
            &units(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::MultipleInheritance { .. }));
        assert!(err.location().is_some());
    }

    #[test]
    fn missing_superclass_source_is_reported() {
        let out = compile(
            r#"
import Base from "./nowhere";

export default class Child extends Base {}
"#,
        );
        assert_eq!(kinds(&out), vec![DiagnosticKind::MissingSourceForSuperclass]);
        assert_block(&out.files[0].content, "extends Base");
    }

    #[test]
    fn closures_are_hoisted_and_called_through_funcref() {
        let out = script(
            r#"
export default class Math2 extends Node {
  run() {
    let add = (a: int) => a + 1;
    print(add(2));
  }
}
"#,
        );
        assert_block(&out, "func __gen_0(a):\n  return a + 1");
        assert_block(&out, "var add = funcref(self, \"__gen_0\")\n  print(add.call_func(2))");
    }

    #[test]
    fn unused_locals_and_callback_params_get_underscores() {
        let out = script(
            r#"
export default class Idle extends Node {
  _process() {
    let unused = 3;
  }
  _ready() {}
}
"#,
        );
        assert_block(&out, "func _process(_delta: float):\n  var _unused: int = 3");
        assert_block(&out, "func _ready():\n  pass");
    }

    #[test]
    fn cross_file_inner_superclass_uses_resource_path() {
        let base = parse_module(
            "src/base.ts",
            "export class Inner extends Node {}\nexport default class Base extends Node2D {}",
        )
        .unwrap();
        let main = parse_module(
            "src/main.ts",
            "import { Inner } from \"./base\";\nimport Base from \"./base\";\nexport default class Main extends Inner {}\nexport class Other extends Base {}",
        )
        .unwrap();

        let outputs = compile_modules(&[base, main], &units()).unwrap();
        let main_out = &outputs[1].files[0].content;
        assert_block(main_out, "extends \"res://base.gd\".Inner\nclass_name Main");
        assert_block(main_out, "class Other extends Base:");
    }

    #[test]
    fn class_expressions_get_their_own_file() {
        let out = compile(
            r#"
export default class Factory extends Node {
  make() {
    return class Spawned extends Node2D {};
  }
}
"#,
        );
        assert_eq!(out.files.len(), 2);
        assert_eq!(out.files[1].unit.res_path, "res://main_Spawned.gd");
        assert_block(&out.files[1].content, "extends Node2D");
        assert_block(&out.files[0].content, "return preload(\"res://main_Spawned.gd\")");
    }

    #[test]
    fn break_nested_inside_a_case_is_reported() {
        let out = compile(
            r#"
export default class Router extends Node {
  route(v: int) {
    for (let i = 0; i < 3; i++) {
      switch (v) {
        case 1:
          if (i == 1) {
            break;
          }
          print(i);
          break;
        default:
          print(0);
      }
    }
  }
}
"#,
        );
        assert_eq!(kinds(&out), vec![DiagnosticKind::UnsupportedSyntax]);
        assert_block(
            &out.files[0].content,
            r#"
  while i < 3:
    match v:
      1:
        if i == 1:
          pass
        print(i)
      _:
        print(0)
    i += 1
"#,
        );
    }

    #[test]
    fn braced_cases_drop_their_break_and_continue_is_reported() {
        let out = compile(
            r#"
export default class Picker extends Node {
  pick(v: int) {
    while (true) {
      switch (v) {
        case 1: {
          print(1);
          break;
        }
        default:
          continue;
      }
    }
  }
}
"#,
        );
        assert_eq!(kinds(&out), vec![DiagnosticKind::UnsupportedSyntax]);
        assert_block(
            &out.files[0].content,
            r#"
  while true:
    match v:
      1:
        print(1)
      _:
        pass
"#,
        );
    }

    #[test]
    fn sequential_loops_do_not_redeclare_their_counter() {
        let out = script(
            r#"
export default class Twice extends Node {
  run() {
    for (let i = 0; i < 3; i++) {}
    for (let i = 0; i < 3; i++) {
      print(i);
    }
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
func run():
  var i: int = 0
  while i < 3:
    i += 1
  var i_1: int = 0
  while i_1 < 3:
    print(i_1)
    i_1 += 1
"#,
        );
    }

    #[test]
    fn export_flags_accept_any_call_arguments() {
        let out = compile(
            r#"
export default class Mask extends Node {
  @export_flags(1, 2)
  mask: int = 0;
  @export_flags
  broken: int = 0;
}
"#,
        );
        assert_eq!(kinds(&out), vec![DiagnosticKind::ExportMetadataShapeError]);
        let text = &out.files[0].content;
        assert_block(text, "export(int, FLAGS, 1, 2) var mask: int = 0");
        assert!(lines(text).contains(&"var broken: int = 0".to_string()));
    }

    #[test]
    fn parenthesized_call_targets_and_casts_are_unwrapped() {
        let out = script(
            r#"
export default class Caller extends Node {
  run(foo: any, a: int) {
    (foo as any)();
    print((a + 1) * 2);
    print((a as float));
  }
}
"#,
        );
        assert_block(&out, "  foo()\n  print((a + 1) * 2)\n  print(a)");
    }

    #[test]
    fn prefix_increments_run_before_the_statement() {
        let out = script(
            r#"
export default class Stepper extends Node {
  step(x: int) {
    print(++x);
    print(x--);
  }
}
"#,
        );
        assert_block(&out, "  x += 1\n  print(x)\n  print(x)\n  x -= 1");
    }

    #[test]
    fn increment_in_condition_with_explicit_else() {
        let out = script(
            r#"
export default class Ticker extends Node {
  tick(x: int) {
    if (x++) {
      print(1);
    } else {
      print(2);
    }
  }
}
"#,
        );
        assert_block(
            &out,
            r#"
  if x:
    print(1)
    x += 1
  else:
    print(2)
    x += 1
"#,
        );
        assert_eq!(out.matches("x += 1").count(), 2);
    }

    #[test]
    fn only_named_default_classes_get_a_class_name() {
        let anonymous = script("export default class extends Node {\n  hp = 1;\n}\n");
        assert!(!anonymous.contains("class_name"));
        assert_block(&anonymous, "extends Node\n\nvar hp: int = 1");

        let named = script("export default class Hero extends Node {}\n");
        assert_eq!(named.matches("class_name").count(), 1);
    }

    #[test]
    fn user_superclass_properties_are_not_redeclared() {
        let base = parse_module("src/base.ts", "export default class Base extends Node {\n  hp = 3;\n}\n").unwrap();
        let main = parse_module(
            "src/main.ts",
            "import Base from \"./base\";\nexport default class Hero extends Base {\n  hp = 5;\n  armor = 1;\n}\n",
        )
        .unwrap();

        let outputs = compile_modules(&[base, main], &units()).unwrap();
        let hero = &outputs[1].files[0].content;
        assert_block(hero, "extends Base\nclass_name Hero");
        assert!(!hero.contains("var hp"));
        assert_block(hero, "var armor: int = 1");
    }

    #[test]
    fn anonymous_default_superclass_is_a_quoted_path() {
        let base = parse_module("src/base.ts", "export default class extends Node2D {}\n").unwrap();
        let main = parse_module(
            "src/main.ts",
            "import Base from \"./base\";\nexport default class Main extends Base {}\n",
        )
        .unwrap();

        let outputs = compile_modules(&[base, main], &units()).unwrap();
        assert!(outputs[1].diagnostics.is_empty());
        assert_block(&outputs[1].files[0].content, "extends \"res://base.gd\"\nclass_name Main");
    }

    #[test]
    fn nullable_exports_use_the_inner_type() {
        let out = script(
            r#"
export default class Slot extends Node {
  @exports
  count: int | null | undefined;
}
"#,
        );
        assert!(lines(&out).contains(&"export(int) var count".to_string()));
    }

    #[test]
    fn one_bad_signal_leaves_the_other_declarations() {
        let fields: String = (0..10).map(|n| format!("  field{n} = {n};\n")).collect();
        let out = compile(&format!(
            "export default class Many extends Node {{\n  broken: Signal;\n{fields}}}\n"
        ));
        assert_eq!(kinds(&out), vec![DiagnosticKind::SignalNamingError]);
        let text = &out.files[0].content;
        for n in 0..10 {
            assert_block(text, &format!("var field{n}: int = {n}"));
        }
        assert!(!text.contains("broken"));
    }

    #[test]
    fn inner_classes_define_the_helpers_they_call() {
        let out = script(
            r#"
export class Logger extends Node {
  log(a: int, b: int) {
    print(a, b);
  }
}

export default class Main extends Node {}
"#,
        );
        assert_block(&out, "class Logger extends Node:\n  func __print(args):");
        assert_block(&out, "    __print([a, b])");
        assert_eq!(out.matches("func __print").count(), 1);
    }
}
