use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::types::Type;

pub static ENGINE_REGISTRY: Lazy<EngineRegistry> = Lazy::new(EngineRegistry::new);

#[derive(Debug, Clone)]
pub struct EngineClass {
    pub base: Option<&'static str>,
    pub properties: Vec<(&'static str, Type)>,
    /// Method name to return type.
    pub methods: Vec<(&'static str, Type)>,
}

/// Engine-native classes the translator knows about, with their inheritance chain.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    classes: FxHashMap<&'static str, EngineClass>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            classes: FxHashMap::default(),
        };

        let vector2 = || Type::native("Vector2");
        let node = || Type::native("Node");

        //--------------------------------
        // Value types
        //--------------------------------
        reg.register_class(
            "Vector2",
            None,
            vec![("x", Type::Float), ("y", Type::Float)],
            vec![
                ("length", Type::Float),
                ("normalized", vector2()),
                ("distance_to", Type::Float),
                ("angle", Type::Float),
                ("rotated", vector2()),
                ("linear_interpolate", vector2()),
            ],
        );
        reg.register_class(
            "Vector3",
            None,
            vec![("x", Type::Float), ("y", Type::Float), ("z", Type::Float)],
            vec![("length", Type::Float), ("normalized", Type::native("Vector3"))],
        );
        reg.register_class(
            "Color",
            None,
            vec![
                ("r", Type::Float),
                ("g", Type::Float),
                ("b", Type::Float),
                ("a", Type::Float),
            ],
            vec![],
        );
        reg.register_class(
            "Rect2",
            None,
            vec![("position", vector2()), ("size", vector2()), ("end", vector2())],
            vec![("has_point", Type::Bool)],
        );
        reg.register_class(
            "Transform2D",
            None,
            vec![("origin", vector2()), ("x", vector2()), ("y", vector2())],
            vec![],
        );

        //--------------------------------
        // Objects and resources
        //--------------------------------
        reg.register_class(
            "Object",
            None,
            vec![],
            vec![
                ("connect", Type::Int),
                ("emit_signal", Type::Void),
                ("get", Type::Any),
                ("set", Type::Void),
                ("call", Type::Any),
            ],
        );
        reg.register_class("Reference", Some("Object"), vec![], vec![]);
        reg.register_class(
            "Resource",
            Some("Reference"),
            vec![("resource_path", Type::String)],
            vec![],
        );
        reg.register_class(
            "PackedScene",
            Some("Resource"),
            vec![],
            vec![("instance", node())],
        );
        reg.register_class("Texture", Some("Resource"), vec![], vec![]);
        reg.register_class("StreamTexture", Some("Texture"), vec![], vec![]);
        reg.register_class("Font", Some("Resource"), vec![], vec![]);
        reg.register_class(
            "DynamicFont",
            Some("Font"),
            vec![("size", Type::Int)],
            vec![],
        );
        reg.register_class("InputEvent", Some("Resource"), vec![], vec![]);
        reg.register_class(
            "InputEventKey",
            Some("InputEvent"),
            vec![("scancode", Type::Int), ("pressed", Type::Bool)],
            vec![],
        );
        reg.register_class(
            "SceneTree",
            Some("Object"),
            vec![("paused", Type::Bool)],
            vec![("quit", Type::Void), ("reload_current_scene", Type::Int)],
        );

        //--------------------------------
        // Nodes
        //--------------------------------
        reg.register_class(
            "Node",
            Some("Object"),
            vec![("name", Type::String), ("owner", node())],
            vec![
                ("get_node", node()),
                ("get_parent", node()),
                ("get_tree", Type::native("SceneTree")),
                ("get_children", Type::Array(Box::new(node()))),
                ("add_child", Type::Void),
                ("remove_child", Type::Void),
                ("queue_free", Type::Void),
                ("is_inside_tree", Type::Bool),
            ],
        );
        reg.register_class(
            "CanvasItem",
            Some("Node"),
            vec![("visible", Type::Bool), ("modulate", Type::native("Color"))],
            vec![("show", Type::Void), ("hide", Type::Void), ("update", Type::Void)],
        );
        reg.register_class(
            "Node2D",
            Some("CanvasItem"),
            vec![
                ("position", vector2()),
                ("global_position", vector2()),
                ("rotation", Type::Float),
                ("scale", vector2()),
            ],
            vec![("look_at", Type::Void), ("translate", Type::Void)],
        );
        reg.register_class(
            "Sprite",
            Some("Node2D"),
            vec![
                ("texture", Type::native("Texture")),
                ("flip_h", Type::Bool),
                ("flip_v", Type::Bool),
                ("frame", Type::Int),
            ],
            vec![],
        );
        reg.register_class(
            "AnimatedSprite",
            Some("Node2D"),
            vec![("animation", Type::String), ("playing", Type::Bool)],
            vec![("play", Type::Void), ("stop", Type::Void)],
        );
        reg.register_class("CollisionObject2D", Some("Node2D"), vec![], vec![]);
        reg.register_class("PhysicsBody2D", Some("CollisionObject2D"), vec![], vec![]);
        reg.register_class(
            "KinematicBody2D",
            Some("PhysicsBody2D"),
            vec![],
            vec![
                ("move_and_slide", vector2()),
                ("is_on_floor", Type::Bool),
            ],
        );
        reg.register_class(
            "Area2D",
            Some("CollisionObject2D"),
            vec![("monitoring", Type::Bool)],
            vec![("get_overlapping_bodies", Type::Array(Box::new(node())))],
        );
        reg.register_class(
            "Camera2D",
            Some("Node2D"),
            vec![("zoom", vector2()), ("current", Type::Bool)],
            vec![],
        );
        reg.register_class(
            "Control",
            Some("CanvasItem"),
            vec![("rect_position", vector2()), ("rect_size", vector2())],
            vec![],
        );
        reg.register_class("Label", Some("Control"), vec![("text", Type::String)], vec![]);
        reg.register_class(
            "BaseButton",
            Some("Control"),
            vec![("disabled", Type::Bool), ("pressed", Type::Bool)],
            vec![],
        );
        reg.register_class("Button", Some("BaseButton"), vec![("text", Type::String)], vec![]);
        reg.register_class(
            "Timer",
            Some("Node"),
            vec![
                ("wait_time", Type::Float),
                ("one_shot", Type::Bool),
                ("autostart", Type::Bool),
            ],
            vec![("start", Type::Void), ("stop", Type::Void), ("is_stopped", Type::Bool)],
        );
        reg.register_class(
            "AudioStreamPlayer",
            Some("Node"),
            vec![("volume_db", Type::Float), ("playing", Type::Bool)],
            vec![("play", Type::Void), ("stop", Type::Void)],
        );
        reg.register_class(
            "Spatial",
            Some("Node"),
            vec![("translation", Type::native("Vector3"))],
            vec![],
        );

        reg
    }

    // ---------------------------------------------------
    // Registration helpers
    // ---------------------------------------------------

    pub fn register_class(
        &mut self,
        name: &'static str,
        base: Option<&'static str>,
        properties: Vec<(&'static str, Type)>,
        methods: Vec<(&'static str, Type)>,
    ) {
        self.classes.insert(
            name,
            EngineClass {
                base,
                properties,
                methods,
            },
        );
    }

    // ---------------------------------------------------
    // Reflection lookups
    // ---------------------------------------------------

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn base_of(&self, name: &str) -> Option<&'static str> {
        self.classes.get(name).and_then(|class| class.base)
    }

    pub fn property_type(&self, class: &str, property: &str) -> Option<Type> {
        let mut current = Some(class);
        while let Some(name) = current {
            let def = self.classes.get(name)?;
            if let Some((_, ty)) = def.properties.iter().find(|(n, _)| *n == property) {
                return Some(ty.clone());
            }
            current = def.base;
        }
        None
    }

    pub fn method_return_type(&self, class: &str, method: &str) -> Option<Type> {
        let mut current = Some(class);
        while let Some(name) = current {
            let def = self.classes.get(name)?;
            if let Some((_, ty)) = def.methods.iter().find(|(n, _)| *n == method) {
                return Some(ty.clone());
            }
            current = def.base;
        }
        None
    }

    /// Property names of `class` and every ancestor.
    pub fn properties(&self, class: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = Some(class);
        while let Some(name) = current {
            let Some(def) = self.classes.get(name) else {
                break;
            };
            out.extend(def.properties.iter().map(|(n, _)| n.to_string()));
            current = def.base;
        }
        out
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_walk_the_base_chain() {
        let reg = &*ENGINE_REGISTRY;
        assert_eq!(reg.base_of("Sprite"), Some("Node2D"));
        assert_eq!(reg.property_type("Sprite", "visible"), Some(Type::Bool));
        assert_eq!(
            reg.method_return_type("KinematicBody2D", "get_node"),
            Some(Type::native("Node"))
        );
        assert!(reg.properties("Node2D").contains(&"name".to_string()));
        assert_eq!(reg.property_type("Vector2", "nope"), None);
    }
}
