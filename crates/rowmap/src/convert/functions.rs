//! Custom value functions referenced by `py` destination specs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::Value;
use crate::error::{MigrateError, Result};

use super::decode::Decoder;

/// A single-argument value transformer.
pub type CustomFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Prefix of the parameterized field extractor, `field:<name>`.
const FIELD_PREFIX: &str = "field:";

/// Named custom functions available to a mapping.
///
/// Starts with the built-ins; callers may register more before building a
/// [`Convertor`](super::Convertor).
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, CustomFn>,
}

impl FunctionRegistry {
    /// Registry with only the built-in functions.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register("upper", |v| map_text(v, |s| s.to_uppercase()));
        registry.register("lower", |v| map_text(v, |s| s.to_lowercase()));
        registry.register("trim", |v| map_text(v, |s| s.trim().to_string()));
        registry.register("null_if_empty", |v| {
            let blank = v.as_text().is_some_and(|text| text.trim().is_empty());
            if blank {
                Value::Null
            } else {
                v
            }
        });
        registry.register("bool", truthy);
        registry.register("json", |v| Decoder::Json.decode(v));
        registry
    }

    /// Register (or replace) a function.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Resolve a function by name.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` for unknown names.
    pub fn resolve(&self, name: &str) -> Result<CustomFn> {
        if let Some(field) = name.strip_prefix(FIELD_PREFIX) {
            if field.is_empty() {
                return Err(MigrateError::Config(format!(
                    "function {:?} needs a field name",
                    name
                )));
            }
            let field = field.to_string();
            return Ok(Arc::new(move |v: Value| v.field(&field).unwrap_or(Value::Null)));
        }

        self.functions.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.functions.keys().map(String::as_str).collect();
            known.sort_unstable();
            MigrateError::Config(format!(
                "unknown function {:?} (available: {}, {}<name>)",
                name,
                known.join(", "),
                FIELD_PREFIX
            ))
        })
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Text(s) => Value::Text(f(&s)),
        other => other,
    }
}

fn truthy(value: Value) -> Value {
    let flag = match &value {
        Value::Null => return Value::Null,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::UInt(u) => *u != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "n" | "off"
        ),
        Value::Bytes(b) => !b.is_empty(),
        Value::Record(r) => !r.is_empty(),
        _ => true,
    };
    Value::Int(i64::from(flag))
}
