//! Deletion requests.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::predicate::{quote_identifier, Predicate};

static DELETE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*DELETE\b").expect("valid regex"));
static DELETE_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*DELETE\s+FROM\s+(.+)$").expect("valid regex"));
static WHERE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+WHERE(\s+|$)").expect("valid regex"));

/// The tables a deletion targets and the rows it removes from them.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub tables: Vec<String>,
    pub predicate: Predicate,
}

impl DeleteRequest {
    pub fn new(table: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            tables: vec![table.into()],
            predicate,
        }
    }

    /// Check if `sql` is a deletion statement (and must therefore parse).
    pub fn is_delete(sql: &str) -> bool {
        DELETE_PREFIX.is_match(sql)
    }

    /// Recover the target tables and filter from a raw
    /// `DELETE FROM <table>[, <table>...] [WHERE <predicate>]` statement.
    ///
    /// Keywords match case-insensitively; backtick and double-quote
    /// quoting and a `main.` schema qualifier are stripped from table names.
    pub fn parse(sql: &str) -> Result<Self, ParseError> {
        let body = DELETE_FROM
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().trim_end_matches(';').trim_end())
            .ok_or_else(|| ParseError::NotDelete(sql.to_string()))?;

        let (from, filter) = match WHERE_KEYWORD.find(body) {
            Some(m) => (&body[..m.start()], Some(body[m.end()..].trim())),
            None => (body, None),
        };

        let tables: Vec<String> = from
            .replace(['`', '"'], "")
            .split(',')
            .map(str::trim)
            .map(unqualified)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tables.is_empty() {
            return Err(ParseError::NoTables(sql.to_string()));
        }

        let predicate = match filter {
            Some("") => return Err(ParseError::EmptyPredicate(sql.to_string())),
            Some(filter) => Predicate::raw(filter),
            None => Predicate::All,
        };

        Ok(Self { tables, predicate })
    }

    /// One `DELETE` statement per target table.
    pub fn statements(&self) -> Vec<String> {
        let filter = self.predicate.where_clause();
        self.tables
            .iter()
            .map(|table| format!("DELETE FROM {}{}", quote_identifier(table), filter))
            .collect()
    }
}

fn unqualified(table: &str) -> &str {
    match table.split_once('.') {
        Some((schema, name)) if schema.trim().eq_ignore_ascii_case("main") => name.trim(),
        _ => table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple() {
        let request = DeleteRequest::parse("DELETE FROM posts WHERE author_id = 5").unwrap();
        assert_eq!(request.tables, vec!["posts"]);
        assert_eq!(request.predicate, Predicate::raw("author_id = 5"));
    }

    #[test]
    fn test_parse_case_insensitive_and_quoted() {
        let request =
            DeleteRequest::parse("delete from `posts`, \"comments\" where id IN (1, 2);").unwrap();
        assert_eq!(request.tables, vec!["posts", "comments"]);
        assert_eq!(request.predicate, Predicate::raw("id IN (1, 2)"));
    }

    #[test]
    fn test_parse_schema_qualified() {
        let request =
            DeleteRequest::parse("DELETE FROM main.posts, \"MAIN\".\"Comments\" WHERE id = 1")
                .unwrap();
        assert_eq!(request.tables, vec!["posts", "Comments"]);
    }

    #[test]
    fn test_parse_without_where() {
        let request = DeleteRequest::parse("DELETE FROM posts").unwrap();
        assert_eq!(request.tables, vec!["posts"]);
        assert!(request.predicate.is_all());
    }

    #[test]
    fn test_parse_multiline() {
        let request = DeleteRequest::parse("DELETE FROM posts\nWHERE\n  id = 1").unwrap();
        assert_eq!(request.predicate, Predicate::raw("id = 1"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            DeleteRequest::parse("DELETE posts WHERE id = 1"),
            Err(ParseError::NotDelete(_))
        ));
        assert!(matches!(
            DeleteRequest::parse("DELETE FROM ``"),
            Err(ParseError::NoTables(_))
        ));
        assert!(matches!(
            DeleteRequest::parse("DELETE FROM posts WHERE "),
            Err(ParseError::EmptyPredicate(_))
        ));
    }

    #[test]
    fn test_is_delete() {
        assert!(DeleteRequest::is_delete("  delete from posts"));
        assert!(!DeleteRequest::is_delete("UPDATE posts SET title = 'x'"));
        assert!(!DeleteRequest::is_delete("SELECT deleted FROM posts"));
    }

    #[test]
    fn test_statements() {
        let request = DeleteRequest {
            tables: vec!["posts".to_string(), "comments".to_string()],
            predicate: Predicate::eq("id", 1),
        };
        assert_eq!(
            request.statements(),
            vec![
                "DELETE FROM \"posts\" WHERE \"id\" = 1",
                "DELETE FROM \"comments\" WHERE \"id\" = 1",
            ]
        );
    }
}
