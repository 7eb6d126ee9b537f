//! Tool descriptors and argument coercion
//!
//! A [`ToolDescriptor`] is the static metadata the reasoning backend reads to
//! decide whether a tool applies. Raw string arguments coming back from the
//! backend are checked and normalized against it before the tool runs.

use crate::{Result, ZarvisError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Type of a single tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ArgType {
    /// JSON schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
        }
    }

    /// A raw value as JSON of this type, falling back to a string
    fn to_json(&self, raw: &str) -> Value {
        let typed = match self {
            ArgType::String => None,
            ArgType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            ArgType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ArgType::Boolean => self.coerce("", raw).ok().map(|v| Value::Bool(v == "true")),
        };
        typed.unwrap_or_else(|| Value::String(raw.to_string()))
    }

    /// Normalize a raw value, rejecting anything that does not parse
    fn coerce(&self, name: &str, raw: &str) -> Result<String> {
        let invalid = || {
            ZarvisError::InvalidArgument(format!(
                "Argument '{}' expects {}, got '{}'",
                name,
                self.as_str(),
                raw
            ))
        };

        match self {
            ArgType::String => Ok(raw.to_string()),
            ArgType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(|v| v.to_string())
                .map_err(|_| invalid()),
            ArgType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.to_string())
                .ok_or_else(invalid),
            ArgType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok("true".to_string()),
                "false" | "0" | "no" => Ok("false".to_string()),
                _ => Err(invalid()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub arg_type: ArgType,
    pub description: String,
    pub required: bool,
    pub default: Option<String>,
}

impl ArgSpec {
    pub fn required(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Static metadata for a capability tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub args: Vec<ArgSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn find_arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }

    /// JSON schema for the arguments, in the function-calling format
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.args {
            let mut property = json!({
                "type": spec.arg_type.as_str(),
                "description": spec.description,
            });
            if let Some(default) = &spec.default {
                property["default"] = spec.arg_type.to_json(default);
            }
            properties.insert(spec.name.clone(), property);
        }

        let required: Vec<&str> = self
            .args
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate raw arguments and fill in defaults
    pub fn coerce(&self, raw: &BTreeMap<String, String>) -> Result<ToolArgs> {
        if let Some(unknown) = raw.keys().find(|k| self.find_arg(k).is_none()) {
            return Err(ZarvisError::InvalidArgument(format!(
                "Unknown argument '{}' for {}",
                unknown, self.name
            )));
        }

        let mut values = BTreeMap::new();
        for spec in &self.args {
            match raw.get(&spec.name) {
                Some(value) => {
                    values.insert(spec.name.clone(), spec.arg_type.coerce(&spec.name, value)?);
                }
                None if spec.required => {
                    return Err(ZarvisError::InvalidArgument(format!(
                        "Missing required argument '{}' for {}",
                        spec.name, self.name
                    )));
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(ToolArgs { values })
    }
}

/// Arguments after validation against a descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArgs {
    values: BTreeMap<String, String>,
}

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fetch an argument the descriptor guarantees to be present
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ZarvisError::InvalidArgument(format!("Missing argument '{}'", name)))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v == "true")
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("speak_tool", "Convert text to speech")
            .arg(ArgSpec::required("text", ArgType::String, "Text to speak"))
            .arg(ArgSpec::optional("speed", ArgType::Number, "Speech rate").with_default("1.0"))
            .arg(ArgSpec::optional("repeat", ArgType::Integer, "Repetitions"))
            .arg(ArgSpec::optional("loud", ArgType::Boolean, "Raise volume"))
    }

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_filled() {
        let args = descriptor().coerce(&raw(&[("text", "hello")])).unwrap();
        assert_eq!(args.get("text"), Some("hello"));
        assert_eq!(args.get_f64("speed"), Some(1.0));
        assert_eq!(args.get("repeat"), None);
    }

    #[test]
    fn test_coercion() {
        let args = descriptor()
            .coerce(&raw(&[("text", "hi"), ("repeat", " 3 "), ("loud", "Yes")]))
            .unwrap();
        assert_eq!(args.get_i64("repeat"), Some(3));
        assert_eq!(args.get_bool("loud"), Some(true));
    }

    #[test]
    fn test_rejections() {
        let d = descriptor();
        assert!(matches!(
            d.coerce(&raw(&[])),
            Err(ZarvisError::InvalidArgument(_))
        ));
        assert!(d.coerce(&raw(&[("text", "hi"), ("repeat", "many")])).is_err());
        assert!(d.coerce(&raw(&[("text", "hi"), ("speed", "NaN")])).is_err());
        assert!(d.coerce(&raw(&[("text", "hi"), ("volume", "11")])).is_err());
    }

    #[test]
    fn test_parameters_schema() {
        let schema = descriptor().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["speed"]["type"], "number");
        assert_eq!(schema["properties"]["speed"]["default"], json!(1.0));
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_schema_defaults_are_typed() {
        let d = ToolDescriptor::new("t", "typed defaults")
            .arg(ArgSpec::optional("count", ArgType::Integer, "n").with_default("3"))
            .arg(ArgSpec::optional("flag", ArgType::Boolean, "b").with_default("yes"))
            .arg(ArgSpec::optional("name", ArgType::String, "s").with_default("42"));
        let schema = d.parameters_schema();
        assert_eq!(schema["properties"]["count"]["default"], json!(3));
        assert_eq!(schema["properties"]["flag"]["default"], json!(true));
        assert_eq!(schema["properties"]["name"]["default"], json!("42"));
        assert_eq!(schema["required"], json!([]));
    }
}
