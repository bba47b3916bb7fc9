//! Destination spec compilation.
//!
//! Each `map` entry's destination side is compiled once into a
//! [`DestConverter`] that turns the resolved source value into zero or more
//! `(destination field, value)` pairs.

use std::fmt;

use crate::config::{DestSpec, FanOutSpec, ValueTable};
use crate::core::{Record, RowLookup, Value};
use crate::error::{MigrateError, Result};

use super::functions::{CustomFn, FunctionRegistry};
use super::key::{parse_key, Resolver};

/// One emitted destination field.
pub type Pair = (String, Value);

/// A compiled destination spec.
#[derive(Clone)]
pub enum DestConverter {
    /// Write the value under `key`, resolved by the key's own suffix.
    Scalar { key: String, resolver: Resolver },
    /// Write the value substituted through a table.
    Mapped { key: String, table: ValueTable },
    /// Write the value transformed by a custom function.
    Custom { key: String, func: CustomFn },
    /// Write to several destinations, in order.
    FanOut(Vec<FanOutItem>),
}

/// One compiled element of a fan-out list.
#[derive(Debug, Clone)]
pub enum FanOutItem {
    /// Send the originating value to another destination.
    Broadcast { key: String, resolver: Resolver },
    /// Read a different field, substitute it, then resolve it under `key`.
    Pull {
        src: String,
        key: String,
        resolver: Resolver,
        table: Option<ValueTable>,
    },
}

impl DestConverter {
    /// Compile a destination spec.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` when an object spec names an unknown
    /// function or has neither a table nor a function.
    pub fn compile(spec: &DestSpec, functions: &FunctionRegistry) -> Result<Self> {
        match spec {
            DestSpec::Key(expr) => {
                let key = parse_key(expr);
                Ok(DestConverter::Scalar {
                    key: key.field,
                    resolver: key.resolver,
                })
            }
            DestSpec::Object(obj) => match (&obj.map, &obj.py) {
                (Some(table), _) => {
                    require_default(&obj.dst, table)?;
                    Ok(DestConverter::Mapped {
                        key: obj.dst.clone(),
                        table: table.clone(),
                    })
                }
                (None, Some(name)) => Ok(DestConverter::Custom {
                    key: obj.dst.clone(),
                    func: functions.resolve(name)?,
                }),
                (None, None) => Err(MigrateError::Config(format!(
                    "destination {:?} needs either `map` or `py`",
                    obj.dst
                ))),
            },
            DestSpec::FanOut(items) => items
                .iter()
                .map(FanOutItem::compile)
                .collect::<Result<Vec<_>>>()
                .map(DestConverter::FanOut),
        }
    }

    /// Produce the destination pairs for one resolved source value.
    ///
    /// `source` is the complete source record, read by fan-out items that
    /// pull a different field.
    pub async fn emit<L>(&self, value: Value, source: &Record, lookup: &mut L) -> Result<Vec<Pair>>
    where
        L: RowLookup + ?Sized,
    {
        match self {
            DestConverter::Scalar { key, resolver } => {
                Ok(vec![(key.clone(), resolver.resolve(value, lookup).await?)])
            }
            DestConverter::Mapped { key, table } => Ok(vec![(key.clone(), table.substitute(&value))]),
            DestConverter::Custom { key, func } => Ok(vec![(key.clone(), func(value))]),
            DestConverter::FanOut(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(pair) = item.emit(&value, source, lookup).await? {
                        pairs.push(pair);
                    }
                }
                Ok(pairs)
            }
        }
    }
}

impl fmt::Debug for DestConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestConverter::Scalar { key, resolver } => f
                .debug_struct("Scalar")
                .field("key", key)
                .field("resolver", resolver)
                .finish(),
            DestConverter::Mapped { key, table } => f
                .debug_struct("Mapped")
                .field("key", key)
                .field("table", table)
                .finish(),
            DestConverter::Custom { key, .. } => f
                .debug_struct("Custom")
                .field("key", key)
                .finish_non_exhaustive(),
            DestConverter::FanOut(items) => f.debug_tuple("FanOut").field(items).finish(),
        }
    }
}

impl FanOutItem {
    fn compile(spec: &FanOutSpec) -> Result<Self> {
        match spec {
            FanOutSpec::Key(expr) => {
                let key = parse_key(expr);
                Ok(FanOutItem::Broadcast {
                    key: key.field,
                    resolver: key.resolver,
                })
            }
            FanOutSpec::Pull { src, dst, map } => {
                if let Some(table) = map {
                    require_default(dst, table)?;
                }
                let key = parse_key(dst);
                Ok(FanOutItem::Pull {
                    src: src.clone(),
                    key: key.field,
                    resolver: key.resolver,
                    table: map.clone(),
                })
            }
        }
    }

    async fn emit<L>(&self, value: &Value, source: &Record, lookup: &mut L) -> Result<Option<Pair>>
    where
        L: RowLookup + ?Sized,
    {
        match self {
            FanOutItem::Broadcast { key, resolver } => {
                let resolved = resolver.resolve(value.clone(), lookup).await?;
                Ok(Some((key.clone(), resolved)))
            }
            FanOutItem::Pull {
                src,
                key,
                resolver,
                table,
            } => {
                // A looked-up row or decoded JSON object is read directly;
                // anything else reads the source row.
                let pulled = match value {
                    Value::Record(_) | Value::Json(serde_json::Value::Object(_)) => value.field(src),
                    _ => source.get(src).cloned(),
                };
                let pulled = match pulled {
                    Some(v) if !v.is_null() => v,
                    _ => return Ok(None),
                };
                let substituted = match table {
                    Some(table) => table.substitute(&pulled),
                    None => pulled,
                };
                let resolved = resolver.resolve(substituted, lookup).await?;
                Ok(Some((key.clone(), resolved)))
            }
        }
    }
}

fn require_default(dst: &str, table: &ValueTable) -> Result<()> {
    if table.default_value().is_none() {
        return Err(MigrateError::Config(format!(
            "value table for {:?} requires a `def` entry",
            dst
        )));
    }
    Ok(())
}
