//! Field-mapping conversion engine.
//!
//! A [`Convertor`] is compiled once from a mapping's `map` and `const`
//! sections and then turns source records into destination records:
//!
//! 1. every source field with a compiled converter has its value resolved by
//!    the source key expression (decoder or row lookup);
//! 2. the destination converter emits zero or more `(field, value)` pairs,
//!    merged into the output with last-write-wins;
//! 3. constants are merged last and always win.
//!
//! Unmapped source fields are dropped.

pub mod decode;
pub mod dest;
pub mod functions;
pub mod key;

pub use decode::Decoder;
pub use dest::{DestConverter, FanOutItem};
pub use functions::{CustomFn, FunctionRegistry};
pub use key::{parse_key, KeyPath, Resolver};

use indexmap::IndexMap;
use tracing::warn;

use crate::config::{DestSpec, MappingSpec};
use crate::core::{Record, RowLookup, Value};
use crate::error::Result;

/// Compiled converter for one source field.
#[derive(Debug, Clone)]
struct FieldConverter {
    source: Resolver,
    dest: DestConverter,
}

/// Compiled record transformer.
#[derive(Debug, Clone)]
pub struct Convertor {
    fields: IndexMap<String, FieldConverter>,
    constants: Record,
}

impl Convertor {
    /// Compile a mapping.
    ///
    /// When two key expressions resolve to the same source field, the later
    /// one replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` for destination specs that cannot be
    /// compiled (unknown function, value table without `def`, ...).
    pub fn new(
        map: &IndexMap<String, DestSpec>,
        constants: &IndexMap<String, serde_json::Value>,
        functions: &FunctionRegistry,
    ) -> Result<Self> {
        let mut fields = IndexMap::with_capacity(map.len());

        for (expr, spec) in map {
            let key = parse_key(expr);
            let converter = FieldConverter {
                source: key.resolver,
                dest: DestConverter::compile(spec, functions)?,
            };
            if fields.insert(key.field.clone(), converter).is_some() {
                warn!(
                    "source field {:?} is mapped more than once, keeping {:?}",
                    key.field, expr
                );
            }
        }

        let constants = constants
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();

        Ok(Self { fields, constants })
    }

    /// Compile the `map` and `const` sections of a mapping spec.
    pub fn from_spec(spec: &MappingSpec, functions: &FunctionRegistry) -> Result<Self> {
        Self::new(&spec.map, &spec.constants, functions)
    }

    /// Source fields this convertor reads, in mapping order.
    ///
    /// Used as the column projection of generated source queries.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Convert one source record.
    ///
    /// `lookup` serves `+db+` key expressions; it is only touched when the
    /// mapping uses them.
    ///
    /// # Errors
    ///
    /// Only lookup failures are errors. Decode problems fall back to the
    /// decoder's default.
    pub async fn process<L>(&self, source: &Record, lookup: &mut L) -> Result<Record>
    where
        L: RowLookup + ?Sized,
    {
        let mut output = Record::with_capacity(self.fields.len() + self.constants.len());

        for (name, raw) in source {
            let Some(converter) = self.fields.get(name) else {
                continue;
            };
            let resolved = converter.source.resolve(raw.clone(), lookup).await?;
            for (key, value) in converter.dest.emit(resolved, source, lookup).await? {
                output.insert(key, value);
            }
        }

        for (key, value) in &self.constants {
            output.insert(key.clone(), value.clone());
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MemorySession};

    fn compile(map_yaml: &str, const_yaml: &str) -> Convertor {
        let map: IndexMap<String, DestSpec> = serde_yaml::from_str(map_yaml).unwrap();
        let constants: IndexMap<String, serde_json::Value> =
            serde_yaml::from_str(const_yaml).unwrap();
        Convertor::new(&map, &constants, &FunctionRegistry::new()).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_example() {
        let convertor = compile(
            r#"{"id+int": uid, name: fullname, "created+date": created_at}"#,
            "{active: 1}",
        );
        let mut session = MemorySession::new();
        let source = record([
            ("id", Value::Int(1)),
            ("name", Value::from("bob")),
            ("created", Value::from("20230101")),
        ]);

        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(
            output,
            record([
                ("uid", Value::Int(1)),
                ("fullname", Value::from("bob")),
                ("created_at", Value::from("2023-01-01 00:00:00")),
                ("active", Value::Int(1)),
            ])
        );
        assert!(session.lookups.is_empty());
    }

    #[test]
    fn test_keys_follow_mapping_order() {
        let convertor = compile(
            r#"{"b+int": x, a: y, "c+db+users+id": z}"#,
            "{}",
        );
        assert_eq!(convertor.keys(), ["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_no_recognized_fields_yields_constants() {
        let mut session = MemorySession::new();
        let source = record([("other", Value::Int(1))]);

        let convertor = compile("{name: fullname}", "{active: 1, kind: user}");
        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(
            output,
            record([("active", Value::Int(1)), ("kind", Value::from("user"))])
        );

        let convertor = compile("{name: fullname}", "{}");
        let output = convertor.process(&source, &mut session).await.unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_constants_override_computed_fields() {
        let convertor = compile("{state: status}", "{status: 9}");
        let mut session = MemorySession::new();
        let source = record([("state", Value::Int(1))]);

        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(output, record([("status", Value::Int(9))]));
    }

    #[tokio::test]
    async fn test_collisions_follow_source_order() {
        let convertor = compile("{a: out, b: out}", "{}");
        let mut session = MemorySession::new();

        let source = record([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(output, record([("out", Value::Int(2))]));

        let source = record([("b", Value::Int(2)), ("a", Value::Int(1))]);
        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(output, record([("out", Value::Int(1))]));
    }

    #[tokio::test]
    async fn test_lookup_with_field_extractor() {
        let convertor = compile(
            r#"
"owner+db+users+uid":
  - { src: name, dst: owner_name }
  - { src: email, dst: owner_email }
"#,
            "{}",
        );
        let mut session = MemorySession::new();
        session.add_lookup_row(
            "users",
            record([
                ("uid", Value::Int(4)),
                ("name", Value::from("ann")),
                ("email", Value::Null),
            ]),
        );

        let source = record([("owner", Value::Int(4))]);
        let output = convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(output, record([("owner_name", Value::from("ann"))]));
        assert_eq!(session.lookups.len(), 1);

        // Each row repeats the lookup.
        convertor.process(&source, &mut session).await.unwrap();
        assert_eq!(session.lookups.len(), 2);
    }

    #[tokio::test]
    async fn test_custom_field_function_on_lookup() {
        let convertor = compile(
            r#"{"owner+db+users+uid": {dst: owner_name, py: "field:name"}}"#,
            "{}",
        );
        let mut session = MemorySession::new();
        session.add_lookup_row(
            "users",
            record([("uid", Value::Int(4)), ("name", Value::from("ann"))]),
        );

        let output = convertor
            .process(&record([("owner", Value::from("4"))]), &mut session)
            .await
            .unwrap();
        assert_eq!(output, record([("owner_name", Value::from("ann"))]));

        let output = convertor
            .process(&record([("owner", Value::from("5"))]), &mut session)
            .await
            .unwrap();
        assert_eq!(output, record([("owner_name", Value::Null)]));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let convertor = compile(r#"{"owner+db+users+uid": owner}"#, "{}");
        let mut session = MemorySession::new();
        session.fail_lookups = true;

        let result = convertor
            .process(&record([("owner", Value::Int(1))]), &mut session)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_function_rejected_at_construction() {
        let map: IndexMap<String, DestSpec> =
            serde_yaml::from_str("{name: {dst: n, py: nope}}").unwrap();
        let result = Convertor::new(&map, &IndexMap::new(), &FunctionRegistry::new());
        assert!(result.is_err());
    }
}
