use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use craftscript_core::functions::ParamType;
use craftscript_core::selector::{Selector, Vec3};
use craftscript_core::world::BlockQuery;

use crate::ast::{BinOp, MacroDecl};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Selector(Selector),
    World(Vec3),
    Waypoint(String),
    Query(BlockQuery),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Selector(s) => write!(f, "{}", s),
            Value::World(p) => write!(f, "world{}", p),
            Value::Waypoint(name) => write!(f, "waypoint({:?})", name),
            Value::Query(q) => write!(f, "{}", q),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Selector(_) => "selector",
            Value::World(_) => "world",
            Value::Waypoint(_) => "waypoint",
            Value::Query(_) => "block query",
        }
    }

    /// Selectors, world coordinates and waypoints resolve to a position.
    pub fn is_spatial(&self) -> bool {
        matches!(self, Value::Selector(_) | Value::World(_) | Value::Waypoint(_))
    }

    pub fn matches_type(&self, ty: ParamType) -> bool {
        matches!(
            (self, ty),
            (Value::Int(_), ParamType::Int)
                | (Value::Bool(_), ParamType::Bool)
                | (Value::Str(_), ParamType::String)
        )
    }

    /// Converts a stored default such as `4` or `"oak_log"` into a value of type `ty`.
    pub fn from_json(json: &serde_json::Value, ty: ParamType) -> Option<Value> {
        match (ty, json) {
            (ParamType::Int, serde_json::Value::Number(n)) => n.as_i64().map(Value::Int),
            (ParamType::Int, serde_json::Value::String(s)) => s.trim().parse().ok().map(Value::Int),
            (ParamType::Bool, serde_json::Value::Bool(b)) => Some(Value::Bool(*b)),
            (ParamType::String, serde_json::Value::String(s)) => Some(Value::Str(s.clone())),
            (ParamType::String, other) if !other.is_null() => Some(Value::Str(other.to_string())),
            _ => None,
        }
    }
}

/// Applies an arithmetic or comparison operator.
///
/// Logical `&&`/`||` short-circuit and are evaluated by the interpreter.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    use Value::*;

    let mismatch = || {
        format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        )
    };
    let overflow = || format!("integer overflow in '{}'", op.symbol());

    match op {
        BinOp::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            (Str(_), _) | (_, Str(_)) => Ok(Str(format!("{}{}", lhs, rhs))),
            _ => Err(mismatch()),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (Int(a), Int(b)) = (lhs, rhs) else {
                return Err(mismatch());
            };
            match op {
                BinOp::Sub => a.checked_sub(*b).ok_or_else(overflow).map(Int),
                BinOp::Mul => a.checked_mul(*b).ok_or_else(overflow).map(Int),
                _ if *b == 0 => Err("division by zero".to_string()),
                _ => a.checked_div(*b).ok_or_else(overflow).map(Int),
            }
        }
        BinOp::Eq => Ok(Bool(lhs == rhs)),
        BinOp::NotEq => Ok(Bool(lhs != rhs)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Int(a), Int(b)) => a.cmp(b),
                (Str(a), Str(b)) => a.cmp(b),
                _ => return Err(mismatch()),
            };
            Ok(Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::And | BinOp::Or => Err(format!("'{}' must be evaluated lazily", op.symbol())),
    }
}

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    macros: HashMap<String, Arc<MacroDecl>>,
    /// Variables of enclosing scopes, other than the global one, are hidden
    /// below a call frame.
    frame: bool,
}

/// Block-scoped variables and macros. Inner scopes shadow outer ones.
///
/// Macro lookups see every enclosing scope. Variable lookups stop at the
/// nearest call frame and then fall back to the global scope.
#[derive(Debug)]
pub struct Env {
    scopes: Vec<Scope>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Opens the scope of a macro or function call.
    pub fn push_frame(&mut self) {
        self.scopes.push(Scope {
            frame: true,
            ..Scope::default()
        });
    }

    /// Pops the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn innermost(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Binds `name` in the innermost scope, shadowing any outer binding.
    pub fn declare(&mut self, name: &str, value: Value) {
        self.innermost().vars.insert(name.to_string(), value);
    }

    /// Indices of the scopes visible to variable lookups, innermost first.
    fn visible(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for i in (0..self.scopes.len()).rev() {
            out.push(i);
            if self.scopes[i].frame {
                if i > 0 {
                    out.push(0);
                }
                break;
            }
        }
        out
    }

    /// Updates the nearest visible binding. Returns `false` when `name` is unbound.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for i in self.visible() {
            if let Some(slot) = self.scopes[i].vars.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.visible()
            .into_iter()
            .find_map(|i| self.scopes[i].vars.get(name))
    }

    pub fn define_macro(&mut self, decl: Arc<MacroDecl>) {
        self.innermost().macros.insert(decl.name.clone(), decl);
    }

    pub fn find_macro(&self, name: &str) -> Option<Arc<MacroDecl>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.macros.get(name))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftscript_core::result::SourceLocation;
    use craftscript_core::selector::{Axis, SelTerm};

    use crate::ast::Block;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        assert_eq!(
            Value::Selector(Selector::new(vec![SelTerm::new(Axis::F, 2)])).to_string(),
            "F2"
        );
        assert_eq!(Value::World(Vec3::new(1, 2, 3)).to_string(), "world(1, 2, 3)");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(binary(BinOp::Add, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(binary(BinOp::Sub, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(-1)));
        assert_eq!(binary(BinOp::Mul, &Value::Int(4), &Value::Int(3)), Ok(Value::Int(12)));
        assert_eq!(binary(BinOp::Div, &Value::Int(7), &Value::Int(2)), Ok(Value::Int(3)));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            binary(BinOp::Add, &Value::Str("step-".into()), &Value::Int(3)),
            Ok(Value::Str("step-3".into()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(err.contains("division by zero"));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(binary(BinOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).is_err());
        assert!(binary(BinOp::Div, &Value::Int(i64::MIN), &Value::Int(-1)).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let err = binary(BinOp::Sub, &Value::Bool(true), &Value::Int(1)).unwrap_err();
        assert!(err.contains("bool"));
        assert!(binary(BinOp::Lt, &Value::Int(1), &Value::Str("a".into())).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinOp::Le, &Value::Int(2), &Value::Int(2)), Ok(Value::Bool(true)));
        assert_eq!(binary(BinOp::Gt, &Value::Int(1), &Value::Int(2)), Ok(Value::Bool(false)));
        assert_eq!(
            binary(BinOp::Eq, &Value::Str("a".into()), &Value::Int(1)),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            binary(BinOp::NotEq, &Value::Bool(true), &Value::Bool(false)),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn test_from_json_defaults() {
        assert_eq!(Value::from_json(&serde_json::json!(4), ParamType::Int), Some(Value::Int(4)));
        assert_eq!(Value::from_json(&serde_json::json!("4"), ParamType::Int), Some(Value::Int(4)));
        assert_eq!(
            Value::from_json(&serde_json::json!(true), ParamType::Bool),
            Some(Value::Bool(true))
        );
        assert_eq!(Value::from_json(&serde_json::json!("x"), ParamType::Bool), None);
    }

    #[test]
    fn test_env_shadowing_and_assignment() {
        let mut env = Env::new();
        env.declare("x", Value::Int(1));
        env.push();
        env.declare("x", Value::Int(2));
        assert_eq!(env.get("x"), Some(&Value::Int(2)));
        assert!(env.assign("x", Value::Int(3)));
        env.pop();
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
        assert!(!env.assign("y", Value::Int(0)));
    }

    #[test]
    fn test_env_assign_reaches_outer_scope() {
        let mut env = Env::new();
        env.declare("count", Value::Int(0));
        env.push();
        assert!(env.assign("count", Value::Int(5)));
        env.pop();
        assert_eq!(env.get("count"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_env_global_scope_survives_pop() {
        let mut env = Env::new();
        env.declare("x", Value::Int(1));
        env.pop();
        assert_eq!(env.depth(), 1);
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_call_frame_hides_caller_locals() {
        let mut env = Env::new();
        env.declare("global", Value::Int(1));
        env.push();
        env.declare("local", Value::Int(2));
        env.push_frame();
        assert_eq!(env.get("global"), Some(&Value::Int(1)));
        assert_eq!(env.get("local"), None);
        assert!(!env.assign("local", Value::Int(3)));
        env.pop();
        assert_eq!(env.get("local"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_macro_lookup() {
        let mut env = Env::new();
        let decl = Arc::new(MacroDecl {
            name: "tunnel".into(),
            params: vec![],
            body: Block { statements: vec![], loc: SourceLocation::new(1, 1) },
            loc: SourceLocation::new(1, 1),
        });
        env.push();
        env.define_macro(decl);
        assert!(env.find_macro("tunnel").is_some());
        env.pop();
        assert!(env.find_macro("tunnel").is_none());
    }
}
