//! Configuration validation.

use super::{Config, DestSpec, FanOutSpec, ValueTable};
use crate::core::identifier::{validate_identifier, validate_predicate};
use crate::drivers::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
///
/// Database names are not required here: they may still arrive from the
/// command line. [`Config::databases`](super::Config::databases) checks them
/// when a connection is about to be made.
pub fn validate(config: &Config) -> Result<()> {
    let mapping = &config.mapping;

    validate_identifier(&mapping.from)
        .map_err(|e| MigrateError::Config(format!("`from`: {}", e)))?;
    validate_identifier(&mapping.to).map_err(|e| MigrateError::Config(format!("`to`: {}", e)))?;

    if mapping.map.is_empty() {
        return Err(MigrateError::Config(
            "`map` is required and must contain at least one field".into(),
        ));
    }

    for (key, dest) in &mapping.map {
        if key.is_empty() {
            return Err(MigrateError::Config("`map` contains an empty key".into()));
        }
        validate_dest(key, dest)?;
    }

    validate_predicate(&mapping.where_clause)
        .map_err(|e| MigrateError::Config(format!("`where`: {}", e)))?;
    validate_predicate(&mapping.check_where)
        .map_err(|e| MigrateError::Config(format!("`check_where`: {}", e)))?;

    if let Some(update_by) = &mapping.update_by {
        if update_by.is_empty() {
            return Err(MigrateError::Config("`update_by` cannot be empty".into()));
        }
    }

    if let Some(check) = &mapping.check {
        if check.is_empty() {
            return Err(MigrateError::Config(
                "`check` must map at least one destination column".into(),
            ));
        }
        if check.iter().any(|(dst, src)| dst.is_empty() || src.is_empty()) {
            return Err(MigrateError::Config(
                "`check` contains an empty column name".into(),
            ));
        }
    }

    if config.connection.port == 0 {
        return Err(MigrateError::Config("connection.port must be non-zero".into()));
    }
    SslMode::parse(&config.connection.ssl_mode)?;

    Ok(())
}

fn validate_dest(key: &str, dest: &DestSpec) -> Result<()> {
    match dest {
        DestSpec::Key(dst) if dst.is_empty() => Err(MigrateError::Config(format!(
            "`map.{}`: destination cannot be empty",
            key
        ))),
        DestSpec::Key(_) => Ok(()),
        DestSpec::Object(obj) => {
            if obj.dst.is_empty() {
                return Err(MigrateError::Config(format!(
                    "`map.{}`: `dst` cannot be empty",
                    key
                )));
            }
            if let Some(table) = &obj.map {
                validate_table(key, table)?;
            }
            if obj.map.is_none() && obj.py.is_none() {
                return Err(MigrateError::Config(format!(
                    "`map.{}`: object destination needs either `map` or `py`",
                    key
                )));
            }
            Ok(())
        }
        DestSpec::FanOut(items) => {
            for item in items {
                let (dst, src) = match item {
                    FanOutSpec::Key(dst) => (dst, None),
                    FanOutSpec::Pull { src, dst, map } => {
                        if let Some(table) = map {
                            validate_table(key, table)?;
                        }
                        (dst, Some(src))
                    }
                };
                if dst.is_empty() || src.is_some_and(|s| s.is_empty()) {
                    return Err(MigrateError::Config(format!(
                        "`map.{}`: fan-out entry has an empty field name",
                        key
                    )));
                }
            }
            Ok(())
        }
    }
}

fn validate_table(key: &str, table: &ValueTable) -> Result<()> {
    if table.default_value().is_none() {
        return Err(MigrateError::Config(format!(
            "`map.{}`: value table requires a `def` entry for unmatched values",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, DestObject, MappingSpec};
    use indexmap::IndexMap;

    fn valid_config() -> Config {
        let mut map = IndexMap::new();
        map.insert("id+int".to_string(), DestSpec::Key("uid".to_string()));
        map.insert("name".to_string(), DestSpec::Key("fullname".to_string()));

        Config {
            connection: ConnectionConfig::default(),
            mapping: MappingSpec {
                from: "users".to_string(),
                to: "accounts".to_string(),
                map,
                constants: IndexMap::new(),
                where_clause: "1".to_string(),
                update_by: None,
                limit: 0,
                check: None,
                check_where: "1".to_string(),
                check_src_use_where: false,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_from() {
        let mut config = valid_config();
        config.mapping.from = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("`from`"));
    }

    #[test]
    fn test_empty_map() {
        let mut config = valid_config();
        config.mapping.map.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_object_without_map_or_py() {
        let mut config = valid_config();
        config.mapping.map.insert(
            "status".to_string(),
            DestSpec::Object(DestObject {
                dst: "state".to_string(),
                map: None,
                py: None,
            }),
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("`map` or `py`"));
    }

    #[test]
    fn test_where_injection_rejected() {
        let mut config = valid_config();
        config.mapping.where_clause = "1; DELETE FROM users".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.connection.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_check() {
        let mut config = valid_config();
        config.mapping.check = Some(IndexMap::new());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_connection_debug_redacts_password() {
        let mut config = valid_config();
        config.connection.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
