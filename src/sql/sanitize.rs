//! PostgreSQL identifier rules
//!
//! Plain lowercase identifiers that are not reserved words are emitted as-is.
//! Everything else is double-quoted with internal quotes doubled, so element
//! names can never break out of identifier position.

use std::sync::LazyLock;

use regex::Regex;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier pattern compiles"));

/// PostgreSQL reserved keywords that cannot be used as unquoted identifiers
pub const POSTGRES_RESERVED_WORDS: &[&str] = &[
    "ALL",
    "ANALYSE",
    "ANALYZE",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASYMMETRIC",
    "BOTH",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "CURRENT_CATALOG",
    "CURRENT_DATE",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "DISTINCT",
    "DO",
    "ELSE",
    "END",
    "EXCEPT",
    "FALSE",
    "FETCH",
    "FOR",
    "FOREIGN",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IN",
    "INITIALLY",
    "INTERSECT",
    "INTO",
    "LATERAL",
    "LEADING",
    "LIMIT",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "ONLY",
    "OR",
    "ORDER",
    "PLACING",
    "PRIMARY",
    "REFERENCES",
    "RETURNING",
    "SELECT",
    "SESSION_USER",
    "SOME",
    "SYMMETRIC",
    "TABLE",
    "THEN",
    "TO",
    "TRAILING",
    "TRUE",
    "UNION",
    "UNIQUE",
    "USER",
    "USING",
    "VARIADIC",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
];

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Example
/// ```
/// use runtara_polystore::sql::quote_identifier;
///
/// let quoted = quote_identifier("my_table");
/// assert_eq!(quoted, "\"my_table\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Lowercase letter followed by lowercase letters, digits or underscores
pub fn is_lower_snake(name: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(name)
}

/// True when `name` can appear unquoted
pub fn is_plain_identifier(name: &str) -> bool {
    is_lower_snake(name) && !is_reserved(name)
}

pub fn is_reserved(name: &str) -> bool {
    POSTGRES_RESERVED_WORDS.contains(&name.to_uppercase().as_str())
}

/// Render an element or table name for use in a statement
///
/// # Example
/// ```
/// use runtara_polystore::sql::identifier;
///
/// assert_eq!(identifier("age"), "age");
/// assert_eq!(identifier("order"), "\"order\"");
/// assert_eq!(identifier("firstName"), "\"firstName\"");
/// ```
pub fn identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// `schema.table`, each part rendered with [`identifier`]
pub fn qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", identifier(schema), identifier(table)),
        None => identifier(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_with_quotes() {
        assert_eq!(
            quote_identifier("table\"with\"quotes"),
            "\"table\"\"with\"\"quotes\""
        );
        assert_eq!(quote_identifier("\"quoted\""), "\"\"\"quoted\"\"\"");
    }

    #[test]
    fn test_quote_identifier_unicode() {
        assert_eq!(quote_identifier("日本語"), "\"日本語\"");
        assert_eq!(quote_identifier("tëst"), "\"tëst\"");
    }

    // =========================================================================
    // identifier Tests
    // =========================================================================

    #[test]
    fn test_plain_names_stay_unquoted() {
        assert_eq!(identifier("products"), "products");
        assert_eq!(identifier("my_table_123"), "my_table_123");
        assert_eq!(identifier("a"), "a");
    }

    #[test]
    fn test_reserved_words_are_quoted() {
        assert_eq!(identifier("select"), "\"select\"");
        assert_eq!(identifier("user"), "\"user\"");
        assert_eq!(identifier("order"), "\"order\"");
    }

    #[test]
    fn test_mixed_case_and_symbols_are_quoted() {
        assert_eq!(identifier("Person"), "\"Person\"");
        assert_eq!(identifier("_id"), "\"_id\"");
        assert_eq!(identifier("address.city"), "\"address.city\"");
        assert_eq!(identifier("1st"), "\"1st\"");
        assert_eq!(identifier("a\" OR 1=1 --"), "\"a\"\" OR 1=1 --\"");
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(qualified(None, "person"), "person");
        assert_eq!(qualified(Some("app"), "Person"), "app.\"Person\"");
    }

    #[test]
    fn test_reserved_words_contains_common_keywords() {
        assert!(POSTGRES_RESERVED_WORDS.contains(&"SELECT"));
        assert!(POSTGRES_RESERVED_WORDS.contains(&"WHERE"));
        assert!(is_reserved("table"));
        assert!(!is_reserved("person"));
    }
}
