//! SQL query generation for sampled verification.

use indexmap::IndexMap;

use crate::core::identifier::{quote_ident, quote_literal};
use crate::core::Record;
use crate::error::{MigrateError, Result};

/// Query drawing one pseudo-random row from `table`.
///
/// Picks a random id between `MIN(id)` and `MAX(id)` and returns the first
/// row at or after it that satisfies `check_where`. Only `t1` columns are
/// selected so the random id never shadows the row's own `id`.
pub fn sample_query(table: &str, check_where: &str) -> String {
    format!(
        r#"SELECT t1.* FROM {table} AS t1 JOIN (SELECT ROUND(RAND() * ((SELECT MAX(id) FROM {table}) - (SELECT MIN(id) FROM {table})) + (SELECT MIN(id) FROM {table})) AS id) AS t2 WHERE t1.id >= t2.id AND ({check_where}) ORDER BY t1.id LIMIT 1"#,
        table = table,
        check_where = check_where,
    )
}

/// Query fetching the source rows a sampled destination row came from.
///
/// Each `check` entry maps a destination column to the source column that
/// must equal it, compared as a string literal.
///
/// # Errors
///
/// Returns `MigrateError::Config` when a `check` column is missing from the
/// sampled row.
pub fn source_query(
    keys: &[&str],
    table: &str,
    where_clause: &str,
    check: &IndexMap<String, String>,
    sampled: &Record,
) -> Result<String> {
    let mut conditions = Vec::with_capacity(check.len() + 1);

    for (dst_column, src_column) in check {
        let value = sampled.get(dst_column).ok_or_else(|| {
            MigrateError::Config(format!(
                "`check` column {:?} not found in destination rows",
                dst_column
            ))
        })?;
        let condition = match value.as_text() {
            Some(text) => format!("{} = {}", quote_ident(src_column), quote_literal(&text)),
            None => format!("{} IS NULL", quote_ident(src_column)),
        };
        conditions.push(condition);
    }
    conditions.push(format!("({})", where_clause));

    let columns: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
    Ok(format!(
        "SELECT {} FROM {} WHERE {}",
        columns.join(","),
        table,
        conditions.join(" AND ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::testing::record;

    #[test]
    fn test_sample_query() {
        let sql = sample_query("`app`.`accounts`", "active = 1");
        assert!(sql.starts_with("SELECT t1.* FROM `app`.`accounts` AS t1 JOIN"));
        assert!(sql.contains("(SELECT MAX(id) FROM `app`.`accounts`)"));
        assert!(sql.ends_with("WHERE t1.id >= t2.id AND (active = 1) ORDER BY t1.id LIMIT 1"));
    }

    #[test]
    fn test_source_query() {
        let mut check = IndexMap::new();
        check.insert("uid".to_string(), "id".to_string());
        check.insert("fullname".to_string(), "name".to_string());
        check.insert("note".to_string(), "memo".to_string());

        let sampled = record([
            ("uid", Value::Int(3)),
            ("fullname", Value::from("o'brien")),
            ("note", Value::Null),
        ]);
        let sql = source_query(&["id", "name"], "`legacy`.`users`", "1", &check, &sampled).unwrap();
        assert_eq!(
            sql,
            "SELECT `id`,`name` FROM `legacy`.`users` WHERE `id` = '3' AND `name` = 'o''brien' AND `memo` IS NULL AND (1)"
        );
    }

    #[test]
    fn test_missing_check_column() {
        let mut check = IndexMap::new();
        check.insert("uid".to_string(), "id".to_string());
        let err = source_query(&["id"], "t", "1", &check, &Record::new()).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}
