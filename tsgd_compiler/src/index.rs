use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::{
    ast::{Annotation, ClassDecl, EnumDecl, Expr, Module, StmtKind, TypeRef},
    engine_defs::ENGINE_REGISTRY,
    error::CompileError,
    types::{ClassRef, EnumRef, Type, TypeEnv, TypeQuery, union_of},
    units::{normalize_path, resolve_import},
};

const MAX_CHAIN_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// File the class is declared in.
    pub unit: PathBuf,
    pub name: Option<String>,
    pub extends: Vec<String>,
    pub is_default: bool,
    pub is_autoload: bool,
    pub is_declare: bool,
    pub properties: Vec<PropertyInfo>,
    pub methods: Vec<(String, Option<TypeRef>)>,
}

impl ClassInfo {
    fn from_decl(unit: &Path, class: &ClassDecl) -> Self {
        Self {
            unit: unit.to_path_buf(),
            name: class.name.clone(),
            extends: class.extends.clone(),
            is_default: class.is_default_export,
            is_autoload: class.has_annotation(&Annotation::Autoload),
            is_declare: class.is_declare,
            properties: class
                .properties()
                .map(|p| PropertyInfo {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    value: p.value.clone(),
                })
                .collect(),
            methods: class
                .methods()
                .map(|m| (m.name.clone(), m.return_type.clone()))
                .collect(),
        }
    }
}

/// How a heritage name resolved from inside a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Superclass {
    Resolved(ClassRef),
    /// Imported from, or expected in, a unit that is not part of the build.
    MissingSource,
}

#[derive(Debug, Clone)]
struct ImportTarget {
    unit: Option<PathBuf>,
    /// `None` for a default import.
    name: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct UnitSymbols {
    classes: FxHashMap<String, ClassRef>,
    default_class: Option<ClassRef>,
    enums: FxHashMap<String, EnumRef>,
    imports: FxHashMap<String, ImportTarget>,
}

/// Project-wide symbol table: every class, enum and import of every unit.
#[derive(Debug, Default)]
pub struct ProgramIndex {
    units: FxHashMap<PathBuf, UnitSymbols>,
    classes: FxHashMap<ClassRef, ClassInfo>,
    /// `declare class` items, treated as engine-native.
    declared: FxHashMap<String, ClassInfo>,
    enums: FxHashMap<EnumRef, Vec<(String, i64)>>,
}

impl ProgramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_modules<'m>(modules: impl IntoIterator<Item = &'m Module>) -> Self {
        let mut index = Self::new();
        for module in modules {
            index.add_module(module);
        }
        index
    }

    pub fn add_module(&mut self, module: &Module) {
        let unit = normalize_path(&module.path);
        let mut symbols = UnitSymbols::default();

        for stmt in &module.body {
            match &stmt.kind {
                StmtKind::Class(class) => {
                    let info = ClassInfo::from_decl(&unit, class);
                    if class.is_declare {
                        if let Some(name) = &class.name {
                            self.declared.insert(name.clone(), info);
                        }
                        continue;
                    }
                    let class_ref = ClassRef::User {
                        unit: unit.clone(),
                        name: class.name.clone(),
                    };
                    if let Some(name) = &class.name {
                        symbols.classes.insert(name.clone(), class_ref.clone());
                    }
                    if class.is_default_export {
                        symbols.default_class = Some(class_ref.clone());
                    }
                    self.classes.insert(class_ref, info);
                }
                StmtKind::Enum(decl) => {
                    let enum_ref = EnumRef {
                        unit: unit.clone(),
                        name: decl.name.clone(),
                    };
                    symbols.enums.insert(decl.name.clone(), enum_ref.clone());
                    self.enums.insert(enum_ref, numbered_members(decl));
                }
                StmtKind::Import(import) => {
                    let target = resolve_import(&unit, &import.source);
                    if let Some(default) = &import.default {
                        symbols.imports.insert(
                            default.clone(),
                            ImportTarget {
                                unit: target.clone(),
                                name: None,
                            },
                        );
                    }
                    for name in &import.names {
                        symbols.imports.insert(
                            name.local.clone(),
                            ImportTarget {
                                unit: target.clone(),
                                name: Some(name.imported.clone()),
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        log::debug!(
            "indexed {}: {} classes, {} enums",
            unit.display(),
            symbols.classes.len() + usize::from(symbols.default_class.is_some()),
            symbols.enums.len()
        );
        self.units.insert(unit, symbols);
    }

    /// Registers every class of a declaration file (`*.d.ts`) as engine-native.
    pub fn add_declarations(&mut self, module: &Module) {
        let unit = normalize_path(&module.path);
        for class in module.classes() {
            if let Some(name) = &class.name {
                self.declared
                    .insert(name.clone(), ClassInfo::from_decl(&unit, class));
            }
        }
    }

    pub fn class_info(&self, class: &ClassRef) -> Option<&ClassInfo> {
        match class {
            ClassRef::User { .. } => self.classes.get(class),
            ClassRef::Native(name) => self.declared.get(name),
        }
    }

    fn is_native(&self, name: &str) -> bool {
        self.declared.contains_key(name) || ENGINE_REGISTRY.contains(name)
    }

    /// Class or enum visible under `name` inside `unit`.
    pub fn resolve_name(&self, unit: &Path, name: &str) -> Option<Type> {
        let unit = normalize_path(unit);
        if let Some(symbols) = self.units.get(&unit) {
            if let Some(class) = symbols.classes.get(name) {
                return Some(Type::Class(class.clone()));
            }
            if let Some(e) = symbols.enums.get(name) {
                return Some(Type::Enum(e.clone()));
            }
            if let Some(import) = symbols.imports.get(name) {
                if let Some(found) = self.resolve_import_target(import) {
                    return Some(found);
                }
            }
        }
        self.is_native(name).then(|| Type::native(name))
    }

    fn resolve_import_target(&self, import: &ImportTarget) -> Option<Type> {
        let target = self.units.get(import.unit.as_ref()?)?;
        match &import.name {
            None => target.default_class.clone().map(Type::Class),
            Some(name) => target
                .classes
                .get(name)
                .map(|c| Type::Class(c.clone()))
                .or_else(|| target.enums.get(name).map(|e| Type::Enum(e.clone()))),
        }
    }

    /// Resolves a heritage name written in `unit`.
    pub fn resolve_superclass(&self, unit: &Path, name: &str) -> Superclass {
        let unit = normalize_path(unit);
        if let Some(symbols) = self.units.get(&unit) {
            if let Some(class) = symbols.classes.get(name) {
                return Superclass::Resolved(class.clone());
            }
            if let Some(import) = symbols.imports.get(name) {
                if import.unit.is_some() {
                    return match self.resolve_import_target(import) {
                        Some(Type::Class(class)) => Superclass::Resolved(class),
                        _ => Superclass::MissingSource,
                    };
                }
            }
        }
        if self.is_native(name) || name.contains('.') {
            Superclass::Resolved(ClassRef::Native(name.to_string()))
        } else {
            Superclass::MissingSource
        }
    }

    fn direct_bases(&self, class: &ClassRef) -> Result<Vec<Type>, CompileError> {
        if let Some(info) = self.class_info(class) {
            if info.extends.len() > 1 {
                return Err(CompileError::MultipleInheritance {
                    class: self.stringify_type(&Type::Class(class.clone())),
                    bases: info.extends.join(", "),
                    location: None,
                });
            }
            return Ok(info
                .extends
                .iter()
                .filter_map(|name| match self.resolve_superclass(&info.unit, name) {
                    Superclass::Resolved(base) => Some(Type::Class(base)),
                    Superclass::MissingSource => None,
                })
                .collect());
        }

        match class {
            ClassRef::Native(name) => Ok(ENGINE_REGISTRY
                .base_of(name)
                .map(Type::native)
                .into_iter()
                .collect()),
            ClassRef::User { .. } => Ok(Vec::new()),
        }
    }

    fn class_member_type(&self, class: &ClassRef, member: &str, depth: usize) -> Option<Type> {
        if depth > MAX_CHAIN_DEPTH {
            return None;
        }

        let Some(info) = self.class_info(class) else {
            let ClassRef::Native(name) = class else {
                return None;
            };
            return ENGINE_REGISTRY.property_type(name, member).or_else(|| {
                ENGINE_REGISTRY
                    .method_return_type(name, member)
                    .map(|ret| Type::Function(Box::new(ret)))
            });
        };

        if let Some(prop) = info.properties.iter().find(|p| p.name == member) {
            let env = StaticEnv {
                index: self,
                unit: &info.unit,
            };
            return Some(match (&prop.ty, &prop.value) {
                (Some(ty), _) => self.type_of_annotation(&info.unit, ty),
                (None, Some(value)) => self.type_of_expr(value, &env),
                (None, None) => Type::Any,
            });
        }
        if let Some((_, ret)) = info.methods.iter().find(|(name, _)| name == member) {
            let ret = ret
                .as_ref()
                .map(|r| self.type_of_annotation(&info.unit, r))
                .unwrap_or(Type::Any);
            return Some(Type::Function(Box::new(ret)));
        }

        let base = self.direct_bases(class).ok()?.into_iter().next()?;
        match base {
            Type::Class(base) => self.class_member_type(&base, member, depth + 1),
            _ => None,
        }
    }
}

impl TypeQuery for ProgramIndex {
    fn type_of_annotation(&self, unit: &Path, ty: &TypeRef) -> Type {
        match ty {
            TypeRef::Named { name, args } => match name.as_str() {
                "int" => Type::Int,
                "float" | "number" => Type::Float,
                "string" | "String" => Type::String,
                "boolean" | "bool" => Type::Bool,
                "void" => Type::Void,
                "any" | "unknown" | "never" | "object" | "Object" => Type::Any,
                "Array" => Type::Array(Box::new(
                    args.first()
                        .map(|a| self.type_of_annotation(unit, a))
                        .unwrap_or(Type::Any),
                )),
                "Dictionary" | "Record" | "Map" => Type::Dictionary,
                "Signal" => Type::Signal,
                other => self.resolve_name(unit, other).unwrap_or(Type::Any),
            },
            TypeRef::Array(elem) => Type::Array(Box::new(self.type_of_annotation(unit, elem))),
            TypeRef::Tuple(_) => Type::Array(Box::new(Type::Any)),
            TypeRef::Union(members) => union_of(
                members
                    .iter()
                    .map(|m| self.type_of_annotation(unit, m))
                    .collect(),
            ),
            TypeRef::Object => Type::Dictionary,
            TypeRef::Function { ret } => {
                Type::Function(Box::new(self.type_of_annotation(unit, ret)))
            }
            TypeRef::Null | TypeRef::Undefined => Type::Null,
            TypeRef::Literal(text) => match text.chars().next() {
                Some('"' | '\'' | '`') => Type::String,
                Some(c) if c.is_ascii_digit() || c == '-' => crate::types::number_literal_type(text),
                _ if text == "true" || text == "false" => Type::Bool,
                _ => Type::Any,
            },
            TypeRef::Unknown(_) => Type::Any,
        }
    }

    fn base_types_of(&self, ty: &Type) -> Result<Vec<Type>, CompileError> {
        let mut chain: Vec<Type> = Vec::new();
        let mut current = ty.clone();

        while let Type::Class(class) = &current {
            let Some(base) = self.direct_bases(class)?.into_iter().next() else {
                break;
            };
            if chain.contains(&base) || chain.len() > MAX_CHAIN_DEPTH {
                break;
            }
            chain.push(base.clone());
            current = base;
        }

        Ok(chain)
    }

    fn stringify_type(&self, ty: &Type) -> String {
        match ty {
            Type::Any => "any".into(),
            Type::Void => "void".into(),
            Type::Null => "null".into(),
            Type::Int => "int".into(),
            Type::Float => "float".into(),
            Type::Bool => "bool".into(),
            Type::String => "String".into(),
            Type::Array(_) => "Array".into(),
            Type::Dictionary => "Dictionary".into(),
            Type::Function(_) => "FuncRef".into(),
            Type::Signal => "Signal".into(),
            Type::Class(ClassRef::Native(name)) => name.clone(),
            Type::Class(ClassRef::User {
                name: Some(name), ..
            }) => name.clone(),
            Type::Class(ClassRef::User { unit, name: None }) => {
                format!("default class of {}", unit.display())
            }
            Type::Enum(e) => e.name.clone(),
            Type::Union(members) => members
                .iter()
                .map(|m| self.stringify_type(m))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    fn member_type(&self, ty: &Type, member: &str) -> Option<Type> {
        match ty {
            Type::Class(class) => self.class_member_type(class, member, 0),
            _ => None,
        }
    }

    fn properties_of(&self, ty: &Type) -> Vec<String> {
        let mut out = Vec::new();
        let mut chain = vec![ty.clone()];
        chain.extend(self.base_types_of(ty).unwrap_or_default());

        for link in chain {
            let Type::Class(class) = link else {
                continue;
            };
            match self.class_info(&class) {
                Some(info) => out.extend(info.properties.iter().map(|p| p.name.clone())),
                None => {
                    if let ClassRef::Native(name) = &class {
                        // registry lookups already include inherited properties
                        out.extend(ENGINE_REGISTRY.properties(name));
                        break;
                    }
                }
            }
        }
        out
    }

    fn enum_members(&self, e: &EnumRef) -> Option<Vec<(String, i64)>> {
        self.enums.get(e).cloned()
    }
}

/// Environment with no local bindings, for typing class-level initializers.
pub struct StaticEnv<'a> {
    pub index: &'a ProgramIndex,
    pub unit: &'a Path,
}

impl TypeEnv for StaticEnv<'_> {
    fn binding_type(&self, _name: &str) -> Option<Type> {
        None
    }

    fn self_type(&self) -> Option<Type> {
        None
    }

    fn annotation_type(&self, ty: &TypeRef) -> Type {
        self.index.type_of_annotation(self.unit, ty)
    }

    fn resolve_type_name(&self, name: &str) -> Option<Type> {
        self.index.resolve_name(self.unit, name)
    }
}

pub fn numbered_members(decl: &EnumDecl) -> Vec<(String, i64)> {
    let mut next = 0;
    decl.members
        .iter()
        .map(|member| {
            let value = member.value.unwrap_or(next);
            next = value + 1;
            (member.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn index(files: &[(&str, &str)]) -> ProgramIndex {
        let modules: Vec<Module> = files
            .iter()
            .map(|(path, src)| parse_module(path, *src).expect("parse failed"))
            .collect();
        ProgramIndex::from_modules(&modules)
    }

    #[test]
    fn base_chain_crosses_units_into_engine_classes() {
        let index = index(&[
            ("src/Base.ts", "export default class Base extends Node2D { hp = 3; }"),
            (
                "src/Player.ts",
                "import Base from './Base';\nexport default class Player extends Base {}",
            ),
        ]);
        let player = index
            .resolve_name(Path::new("src/Player.ts"), "Player")
            .expect("player resolves");
        let chain: Vec<String> = index
            .base_types_of(&player)
            .expect("single inheritance")
            .iter()
            .map(|t| index.stringify_type(t))
            .collect();
        assert_eq!(chain, vec!["Base", "Node2D", "CanvasItem", "Node", "Object"]);

        let props = index.properties_of(&player);
        assert!(props.contains(&"hp".to_string()));
        assert!(props.contains(&"position".to_string()));
    }

    #[test]
    fn multiple_direct_bases_is_an_error() {
        let index = index(&[("src/A.ts", "export default class A extends B, C {}")]);
        let a = index.resolve_name(Path::new("src/A.ts"), "A").expect("A");
        assert!(matches!(
            index.base_types_of(&a),
            Err(CompileError::MultipleInheritance { .. })
        ));
    }

    #[test]
    fn enum_members_are_numbered_in_declaration_order() {
        let index = index(&[("src/E.ts", "export enum Mode { A, B = 5, C }")]);
        let Some(Type::Enum(mode)) = index.resolve_name(Path::new("src/E.ts"), "Mode") else {
            panic!("enum should resolve");
        };
        assert_eq!(
            index.enum_members(&mode),
            Some(vec![("A".into(), 0), ("B".into(), 5), ("C".into(), 6)])
        );
    }

    #[test]
    fn imports_from_unknown_units_are_missing_sources() {
        let index = index(&[(
            "src/A.ts",
            "import { Gone } from './Gone';\nexport default class A extends Gone {}",
        )]);
        assert_eq!(
            index.resolve_superclass(Path::new("src/A.ts"), "Gone"),
            Superclass::MissingSource
        );
        assert_eq!(
            index.resolve_superclass(Path::new("src/A.ts"), "Sprite"),
            Superclass::Resolved(ClassRef::Native("Sprite".into()))
        );
    }
}
