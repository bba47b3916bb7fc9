//! Identifier and literal quoting for dynamically built MySQL statements.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! statement this crate generates embeds them quoted. Identifiers that come
//! from the configuration file (databases, tables) are validated first;
//! column names coming from mapping output go through [`quote_ident`], which
//! only escapes.
//!
//! Values are bound as parameters wherever the statement shape allows it.
//! The one exception is the verifier's source lookup, which compares against
//! quoted string literals built by [`quote_literal`].

use crate::error::{MigrateError, Result};

/// Maximum identifier length (MySQL allows 64 characters; leave headroom
/// for multi-byte names).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `MigrateError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks, without validation.
///
/// Used for column names produced by the mapping, which may come from
/// lookup results and are never empty in practice.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a possibly database-qualified name (`db.table`), part by part.
pub fn quote_path(path: &str) -> String {
    path.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
/// Validates the identifier before quoting.
///
/// # Examples
///
/// ```
/// use rowmap::core::identifier::quote_mysql;
///
/// assert_eq!(quote_mysql("users").unwrap(), "`users`");
/// assert_eq!(quote_mysql("table`name").unwrap(), "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(quote_ident(name))
}

/// Qualify a MySQL table name with its database.
///
/// Returns `` `database`.`table` `` with proper quoting.
pub fn qualify_mysql(database: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mysql(database)?, quote_mysql(table)?))
}

/// Quote a value as a MySQL string literal.
///
/// Escapes single quotes, backslashes and NUL for the default SQL mode.
/// Prefer bound parameters wherever the statement allows it.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Validate a user-supplied SQL predicate (`where`, `check_where`).
///
/// Predicates come straight from the configuration file and are embedded
/// verbatim, so they must be a single boolean expression. Quoted strings
/// and identifiers are skipped, so `note <> '--'` is accepted.
///
/// # Rejected Patterns
///
/// - Semicolons (multiple statement injection)
/// - SQL comments (`--`, `#`, `/*`, `*/`)
/// - Unterminated quotes
/// - Empty predicates
pub fn validate_predicate(predicate: &str) -> Result<()> {
    if predicate.trim().is_empty() {
        return Err(MigrateError::Config(
            "SQL predicate cannot be empty (use \"1\" for no restriction)".to_string(),
        ));
    }

    let Some(code) = strip_quoted(predicate) else {
        return Err(MigrateError::Config(format!(
            "Predicate contains an unterminated quote: {:?}",
            predicate
        )));
    };

    if code.contains(';') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Predicate contains semicolon (possible injection): {:?}",
            predicate
        )));
    }

    if code.contains("--") || code.contains('#') || code.contains("/*") || code.contains("*/") {
        return Err(MigrateError::Config(format!(
            "SECURITY: Predicate contains SQL comment markers (possible injection): {:?}",
            predicate
        )));
    }

    Ok(())
}

/// Blank out quoted strings and identifiers, keeping their delimiters.
///
/// Handles doubled delimiters and backslash escapes inside string
/// literals. Returns `None` when a quote is left open.
fn strip_quoted(sql: &str) -> Option<String> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if !matches!(c, '\'' | '"' | '`') {
            out.push(c);
            continue;
        }

        out.push(c);
        let mut closed = false;
        while let Some(inner) = chars.next() {
            if inner == '\\' && c != '`' {
                chars.next()?;
                out.push(' ');
                continue;
            }
            if inner == c {
                if chars.peek() == Some(&c) {
                    chars.next();
                    out.push(' ');
                    continue;
                }
                closed = true;
                break;
            }
            out.push(' ');
        }
        if !closed {
            return None;
        }
        out.push(c);
    }

    Some(out)
}
