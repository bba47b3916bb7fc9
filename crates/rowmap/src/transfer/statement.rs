//! Per-row INSERT/UPDATE statement builders.
//!
//! Converted records can differ in shape from row to row (fan-outs skip
//! absent fields), so every row gets its own statement.

use crate::core::identifier::quote_ident;
use crate::core::{Record, Statement};

/// Build the statement for one converted record.
///
/// Returns `None` when there is nothing to execute.
pub fn build_statement(table: &str, record: Record, update_by: Option<&str>) -> Option<Statement> {
    match update_by {
        Some(key) => build_update(table, record, key),
        None => build_insert(table, record),
    }
}

/// `INSERT INTO table (`a`,`b`) VALUES (?,?)`; `None` for an empty record.
pub fn build_insert(table: &str, record: Record) -> Option<Statement> {
    if record.is_empty() {
        return None;
    }

    let columns: Vec<String> = record.keys().map(|k| quote_ident(k)).collect();
    let placeholders = vec!["?"; record.len()].join(",");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(","),
        placeholders
    );

    Some(Statement::new(sql, record.into_values().collect()))
}

/// `UPDATE table SET `a`=?, ... WHERE `key` = ?`, keyed by the record's own
/// `key` value, which is bound last.
///
/// Returns `None` when the key is missing or NULL, or when no other field is
/// left to set.
pub fn build_update(table: &str, mut record: Record, key: &str) -> Option<Statement> {
    let key_value = record.shift_remove(key)?;
    if key_value.is_null() || record.is_empty() {
        return None;
    }

    let assignments: Vec<String> = record
        .keys()
        .map(|k| format!("{}=?", quote_ident(k)))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        quote_ident(key)
    );

    let mut params: Vec<_> = record.into_values().collect();
    params.push(key_value);
    Some(Statement::new(sql, params))
}
