//! Persisted custom functions.
//!
//! A custom function is a named, versioned CraftScript body saved for one
//! actor. Scripts call it exactly like a command; the interpreter fetches it
//! from a [`FunctionStore`] on first use, parses the body and caches it for the
//! rest of the run.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::{read_json_list, sanitize_actor, StoreError};

/// Declared type of a macro or function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Int,
    Bool,
    String,
}

impl ParamType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(ParamType::Int),
            "bool" => Some(ParamType::Bool),
            "string" => Some(ParamType::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::String => "string",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ParamType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FunctionArg {
    pub fn required(name: impl Into<String>, arg_type: ParamType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            optional: false,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, arg_type: ParamType, default: Option<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arg_type,
            optional: true,
            default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<FunctionArg>,
    /// CraftScript source of the function body.
    pub body: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl CustomFunction {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            args: Vec::new(),
            body: body.into(),
            version: 1,
        }
    }

    pub fn with_arg(mut self, arg: FunctionArg) -> Self {
        self.args.push(arg);
        self
    }
}

#[async_trait]
pub trait FunctionStore: Send + Sync {
    async fn get_function(&self, actor: &str, name: &str) -> Result<Option<CustomFunction>, StoreError>;
}

/// Reads `<dir>/<actor>_functions.json`. When several versions of a name are
/// stored, the highest version wins.
#[derive(Debug, Clone)]
pub struct JsonFunctionStore {
    dir: PathBuf,
}

impl JsonFunctionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, actor: &str) -> PathBuf {
        self.dir
            .join(format!("{}_functions.json", sanitize_actor(actor)))
    }
}

#[async_trait]
impl FunctionStore for JsonFunctionStore {
    async fn get_function(&self, actor: &str, name: &str) -> Result<Option<CustomFunction>, StoreError> {
        let Some(functions) = read_json_list::<CustomFunction>(&self.path_for(actor)).await? else {
            return Ok(None);
        };
        Ok(functions
            .into_iter()
            .filter(|f| f.name == name)
            .max_by_key(|f| f.version))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFunctionStore {
    functions: HashMap<String, HashMap<String, CustomFunction>>,
}

impl MemoryFunctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, actor: &str, function: CustomFunction) -> Self {
        self.functions
            .entry(actor.to_string())
            .or_default()
            .insert(function.name.clone(), function);
        self
    }
}

#[async_trait]
impl FunctionStore for MemoryFunctionStore {
    async fn get_function(&self, actor: &str, name: &str) -> Result<Option<CustomFunction>, StoreError> {
        Ok(self.functions.get(actor).and_then(|m| m.get(name)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_store_picks_latest_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bot_functions.json"),
            r#"[
                {"name":"tunnel","body":"dig(f1);","version":1},
                {"name":"tunnel","body":"dig(f1); dig(f1^);","version":3,
                 "args":[{"name":"len","type":"int","optional":true,"default":4}]},
                {"name":"other","body":"log(\"x\");"}
            ]"#,
        )
        .unwrap();

        let store = JsonFunctionStore::new(dir.path());
        let f = store.get_function("bot", "tunnel").await.unwrap().unwrap();
        assert_eq!(f.version, 3);
        assert_eq!(f.args[0].arg_type, ParamType::Int);
        assert!(f.args[0].optional);
        assert_eq!(f.args[0].default, Some(serde_json::json!(4)));

        let other = store.get_function("bot", "other").await.unwrap().unwrap();
        assert_eq!(other.version, 1);
        assert!(store.get_function("bot", "missing").await.unwrap().is_none());
    }

    #[test]
    fn param_type_names() {
        for t in [ParamType::Int, ParamType::Bool, ParamType::String] {
            assert_eq!(ParamType::from_name(t.name()), Some(t));
        }
        assert_eq!(ParamType::from_name("float"), None);
    }
}
