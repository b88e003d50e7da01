//! SQL statement-kind classification.
//!
//! Classifies a statement by its leading keyword into the closed vocabulary
//! this library supports. There is no parsing beyond the prefix: anything
//! that is not a CREATE TABLE, INSERT INTO, or SELECT statement — including
//! every destructive or administrative statement (DROP, DELETE, TRUNCATE,
//! ALTER, CREATE DATABASE, ...) — classifies as `Unsupported` and is
//! rejected before it can reach the database.

use std::fmt;

/// The kind of SQL statement, derived from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    /// `CREATE TABLE ...`
    Create,
    /// `INSERT INTO ...`
    Insert,
    /// `SELECT ...`
    Select,
    /// Anything else. Never executed.
    Unsupported,
}

impl SqlKind {
    /// Returns true if statements of this kind may be executed.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE TABLE"),
            Self::Insert => write!(f, "INSERT INTO"),
            Self::Select => write!(f, "SELECT"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Classifies a SQL string by its leading keyword.
///
/// Leading whitespace is ignored and matching is case-insensitive. The
/// keyword must end at a word boundary, so `SELECTX ...` is `Unsupported`
/// rather than `Select`. Pure function; no side effects.
pub fn classify(sql: &str) -> SqlKind {
    if let Some(rest) = strip_keyword(sql, "CREATE") {
        if strip_keyword(rest, "TABLE").is_some() {
            return SqlKind::Create;
        }
        // CREATE DATABASE, CREATE INDEX, etc. are out of vocabulary.
        return SqlKind::Unsupported;
    }

    if let Some(rest) = strip_keyword(sql, "INSERT") {
        if strip_keyword(rest, "INTO").is_some() {
            return SqlKind::Insert;
        }
        return SqlKind::Unsupported;
    }

    if strip_keyword(sql, "SELECT").is_some() {
        return SqlKind::Select;
    }

    SqlKind::Unsupported
}

/// Strips `word` from the start of `text` (after leading whitespace),
/// case-insensitively, requiring a word boundary after it. Returns the
/// remainder on a match.
fn strip_keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let text = text.trim_start();
    if text.len() < word.len() || !text.is_char_boundary(word.len()) {
        return None;
    }

    let (head, rest) = text.split_at(word.len());
    if !head.eq_ignore_ascii_case(word) {
        return None;
    }

    match rest.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_create_table() {
        assert_eq!(classify("CREATE TABLE employee (id INT)"), SqlKind::Create);
        assert_eq!(classify("create table employee (id INT)"), SqlKind::Create);
        assert_eq!(classify("  \n\tCreate  Table t (x INT)"), SqlKind::Create);
    }

    #[test]
    fn test_classify_insert_into() {
        assert_eq!(
            classify("INSERT INTO employee(name) VALUES('Dan')"),
            SqlKind::Insert
        );
        assert_eq!(
            classify("insert into employee(name) values('Dan')"),
            SqlKind::Insert
        );
    }

    #[test]
    fn test_classify_select() {
        assert_eq!(classify("SELECT * FROM employee"), SqlKind::Select);
        assert_eq!(classify("   select 1"), SqlKind::Select);
        assert_eq!(classify("SELECT(1)"), SqlKind::Select);
    }

    #[test]
    fn test_classify_requires_word_boundary() {
        assert_eq!(classify("SELECTX FROM t"), SqlKind::Unsupported);
        assert_eq!(classify("CREATETABLE t (x INT)"), SqlKind::Unsupported);
        assert_eq!(classify("INSERTINTO t VALUES(1)"), SqlKind::Unsupported);
    }

    #[test]
    fn test_classify_create_without_table_is_unsupported() {
        assert_eq!(classify("CREATE DATABASE test_db"), SqlKind::Unsupported);
        assert_eq!(classify("CREATE INDEX idx ON t(x)"), SqlKind::Unsupported);
        assert_eq!(classify("CREATE"), SqlKind::Unsupported);
    }

    #[test]
    fn test_classify_insert_without_into_is_unsupported() {
        assert_eq!(classify("INSERT employee VALUES(1)"), SqlKind::Unsupported);
        assert_eq!(classify("INSERT"), SqlKind::Unsupported);
    }

    #[test]
    fn test_classify_destructive_statements_are_unsupported() {
        for sql in [
            "DROP TABLE employee",
            "DROP DATABASE test_db",
            "DELETE FROM employee",
            "TRUNCATE employee",
            "ALTER TABLE employee ADD COLUMN x INT",
            "UPDATE employee SET name = 'x'",
            "GRANT ALL ON employee TO public",
        ] {
            assert_eq!(classify(sql), SqlKind::Unsupported, "sql: {sql}");
        }
    }

    #[test]
    fn test_classify_empty_and_garbage() {
        assert_eq!(classify(""), SqlKind::Unsupported);
        assert_eq!(classify("   "), SqlKind::Unsupported);
        assert_eq!(classify("-- comment"), SqlKind::Unsupported);
        assert_eq!(classify("(SELECT 1)"), SqlKind::Unsupported);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SqlKind::Create.to_string(), "CREATE TABLE");
        assert_eq!(SqlKind::Insert.to_string(), "INSERT INTO");
        assert_eq!(SqlKind::Select.to_string(), "SELECT");
        assert_eq!(SqlKind::Unsupported.to_string(), "unsupported");
    }

    #[test]
    fn test_is_supported() {
        assert!(SqlKind::Create.is_supported());
        assert!(SqlKind::Insert.is_supported());
        assert!(SqlKind::Select.is_supported());
        assert!(!SqlKind::Unsupported.is_supported());
    }
}
