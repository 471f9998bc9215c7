//! Typed row filters rendered to SQL fragments.
//!
//! A [`Predicate`] identifies the rows a deletion (and therefore a move)
//! targets. Free-form text from legacy statements and configured base
//! conditions is carried as [`Predicate::Raw`] and always parenthesised
//! when combined.

use std::fmt;

use crate::value::Value;

/// A row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    All,
    /// Free-form SQL boolean expression.
    Raw(String),
    /// `column = value` (`IS NULL` when the value is null).
    Eq {
        /// Column name.
        column: String,
        /// Value to compare against.
        value: Value,
    },
    /// `column <> value` (`IS NOT NULL` when the value is null).
    NotEq {
        /// Column name.
        column: String,
        /// Value to compare against.
        value: Value,
    },
    /// `column IN (values...)`.
    In {
        /// Column name.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// `column IS NULL`.
    IsNull {
        /// Column name.
        column: String,
    },
    /// `column IS NOT NULL`.
    IsNotNull {
        /// Column name.
        column: String,
    },
    /// Conjunction of predicates.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Free-form SQL; blank text matches every row.
    pub fn raw(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            Predicate::All
        } else {
            Predicate::Raw(trimmed.to_string())
        }
    }

    /// Equality filter.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Inequality filter.
    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::NotEq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Membership filter.
    pub fn in_list(column: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Null filter.
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    /// Non-null filter.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull {
            column: column.into(),
        }
    }

    /// Optional free-form condition, as carried by bindings and move options.
    pub fn from_conditions(conditions: Option<&str>) -> Self {
        conditions.map(Predicate::raw).unwrap_or(Predicate::All)
    }

    /// Combine with another predicate, flattening nested conjunctions.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut parts = Vec::new();
        for p in [self, other] {
            match p {
                Predicate::All => {}
                Predicate::And(inner) => parts.extend(inner),
                p => parts.push(p),
            }
        }
        match parts.len() {
            0 => Predicate::All,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Check if this predicate matches every row.
    pub fn is_all(&self) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(parts) => parts.iter().all(Predicate::is_all),
            _ => false,
        }
    }

    /// Render as an SQL boolean expression, `None` for [`Predicate::All`].
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Predicate::All => None,
            Predicate::Raw(sql) => Some(sql.clone()),
            Predicate::Eq { column, value } if value.is_null() => {
                Some(format!("{} IS NULL", quote_identifier(column)))
            }
            Predicate::Eq { column, value } => Some(format!(
                "{} = {}",
                quote_identifier(column),
                value.to_sql_literal()
            )),
            Predicate::NotEq { column, value } if value.is_null() => {
                Some(format!("{} IS NOT NULL", quote_identifier(column)))
            }
            Predicate::NotEq { column, value } => Some(format!(
                "{} <> {}",
                quote_identifier(column),
                value.to_sql_literal()
            )),
            Predicate::In { values, .. } if values.is_empty() => Some("1 = 0".to_string()),
            Predicate::In { column, values } => {
                let list: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
                Some(format!("{} IN ({})", quote_identifier(column), list.join(", ")))
            }
            Predicate::IsNull { column } => Some(format!("{} IS NULL", quote_identifier(column))),
            Predicate::IsNotNull { column } => {
                Some(format!("{} IS NOT NULL", quote_identifier(column)))
            }
            Predicate::And(parts) => {
                let rendered: Vec<String> = parts
                    .iter()
                    .filter_map(|p| {
                        let sql = p.to_sql()?;
                        Some(match p {
                            Predicate::Raw(_) | Predicate::And(_) => format!("({sql})"),
                            _ => sql,
                        })
                    })
                    .collect();
                match rendered.len() {
                    0 => None,
                    1 => parts.iter().find_map(Predicate::to_sql),
                    _ => Some(rendered.join(" AND ")),
                }
            }
        }
    }

    /// Render as a ` WHERE ...` suffix (empty for [`Predicate::All`]).
    pub fn where_clause(&self) -> String {
        match self.to_sql() {
            Some(sql) => format!(" WHERE {sql}"),
            None => String::new(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_sql() {
            Some(sql) => f.write_str(&sql),
            None => f.write_str("TRUE"),
        }
    }
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_rendering() {
        assert_eq!(
            Predicate::eq("author_id", 5).to_sql().as_deref(),
            Some("\"author_id\" = 5")
        );
        assert_eq!(
            Predicate::eq("deleted_at", Value::Null).to_sql().as_deref(),
            Some("\"deleted_at\" IS NULL")
        );
        assert_eq!(
            Predicate::is_not_null("deleted_at").to_sql().as_deref(),
            Some("\"deleted_at\" IS NOT NULL")
        );
        assert_eq!(
            Predicate::in_list("id", vec![1.into(), 2.into()]).to_sql().as_deref(),
            Some("\"id\" IN (1, 2)")
        );
        assert_eq!(Predicate::in_list("id", vec![]).to_sql().as_deref(), Some("1 = 0"));
        assert_eq!(Predicate::All.to_sql(), None);
    }

    #[test]
    fn test_blank_raw_is_all() {
        assert_eq!(Predicate::raw("   "), Predicate::All);
        assert_eq!(Predicate::from_conditions(None), Predicate::All);
    }

    #[test]
    fn test_and_flattens_and_parenthesises_raw() {
        let p = Predicate::raw("a = 1 OR b = 2")
            .and(Predicate::All)
            .and(Predicate::eq("c", "x"));
        assert_eq!(
            p.to_sql().as_deref(),
            Some("(a = 1 OR b = 2) AND \"c\" = 'x'")
        );
        if let Predicate::And(parts) = &p {
            assert_eq!(parts.len(), 2);
        } else {
            panic!("expected conjunction");
        }
    }

    #[test]
    fn test_and_with_single_part_is_unwrapped() {
        let p = Predicate::All.and(Predicate::raw("x > 3"));
        assert_eq!(p, Predicate::Raw("x > 3".to_string()));
        assert_eq!(p.where_clause(), " WHERE x > 3");
        assert_eq!(Predicate::All.where_clause(), "");
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
