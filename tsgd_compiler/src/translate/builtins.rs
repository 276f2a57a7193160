/// `Math.*` members with a global GDScript equivalent.
pub struct TypeScriptMath;

impl TypeScriptMath {
    pub const NAME: &'static str = "Math";

    pub fn resolve_method(method: &str) -> Option<&'static str> {
        match method {
            "floor" => Some("floor"),
            "ceil" => Some("ceil"),
            "round" => Some("round"),
            "abs" => Some("abs"),
            "sqrt" => Some("sqrt"),
            "pow" => Some("pow"),
            "min" => Some("min"),
            "max" => Some("max"),
            "sin" => Some("sin"),
            "cos" => Some("cos"),
            "tan" => Some("tan"),
            "asin" => Some("asin"),
            "acos" => Some("acos"),
            "atan" => Some("atan"),
            "atan2" => Some("atan2"),
            "exp" => Some("exp"),
            "log" => Some("log"),
            "sign" => Some("sign"),
            "random" => Some("randf"),
            _ => None,
        }
    }

    pub fn resolve_constant(name: &str) -> Option<&'static str> {
        match name {
            "PI" => Some("PI"),
            "E" => Some("exp(1.0)"),
            "SQRT2" => Some("sqrt(2.0)"),
            _ => None,
        }
    }
}

/// `console.*` logging calls.
pub struct TypeScriptConsole;

impl TypeScriptConsole {
    pub const NAME: &'static str = "console";

    pub fn resolve_method(method: &str) -> Option<&'static str> {
        match method {
            "log" | "info" | "debug" => Some("print"),
            "error" | "warn" => Some("push_error"),
            _ => None,
        }
    }
}

/// Methods on array receivers that map onto a differently named target method.
pub struct TypeScriptArray;

impl TypeScriptArray {
    pub fn resolve_method(method: &str) -> Option<&'static str> {
        match method {
            "push" => Some("append"),
            "indexOf" => Some("find"),
            "includes" => Some("has"),
            "pop" => Some("pop_back"),
            "shift" => Some("pop_front"),
            "unshift" => Some("push_front"),
            "reverse" => Some("invert"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_and_console_members_resolve() {
        assert_eq!(TypeScriptMath::resolve_method("random"), Some("randf"));
        assert_eq!(TypeScriptMath::resolve_constant("PI"), Some("PI"));
        assert_eq!(TypeScriptMath::resolve_method("hypot"), None);
        assert_eq!(TypeScriptConsole::resolve_method("log"), Some("print"));
        assert_eq!(TypeScriptArray::resolve_method("push"), Some("append"));
    }
}
