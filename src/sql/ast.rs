//! SQL Abstract Syntax Tree (AST)
//!
//! This module defines one statement variant per supported command. Every
//! statement renders back to canonical SQL through `Display`.

use std::fmt;

use super::literal::format_literal;
use super::token::Token;
use crate::catalog::{Column, TableDef};
use crate::error::{Error, Result};
use crate::storage::{Record, Value};

/// A SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE name (col type, ...)
    CreateTable(CreateTableStatement),
    /// CREATE TABLE name AS SELECT ... [UNION ALL SELECT ...]*
    CreateTableAsSelect(CreateTableAsStatement),
    /// DROP TABLE name
    DropTable(DropTableStatement),
    /// SELECT cols FROM table [WHERE col = literal]
    Select(SelectStatement),
    /// INSERT INTO table [(cols)] VALUES (vals)[, (vals)]*
    Insert(InsertStatement),
    /// DELETE FROM table [WHERE col = literal]
    Delete(DeleteStatement),
}

impl Statement {
    /// Whether executing this statement changes the schema
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Statement::CreateTable(_) | Statement::CreateTableAsSelect(_) | Statement::DropTable(_)
        )
    }
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub columns: Vec<Column>,
}

/// CREATE TABLE ... AS SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAsStatement {
    pub table_name: String,
    /// One entry per `SELECT`, split on `UNION ALL`
    pub selects: Vec<SelectValues>,
}

/// The value list of one `SELECT` without `FROM`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectValues {
    pub items: Vec<SelectItem>,
}

/// One item of a [`SelectValues`] list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    /// The expression as written, used in error messages
    pub text: String,
    /// The expression coerced to a value
    pub value: Value,
    pub alias: Option<String>,
}

impl CreateTableAsStatement {
    /// Build the table definition and the rows to load
    ///
    /// The first `SELECT` defines the schema: every item needs an alias and
    /// its value's type becomes the column type. Later `SELECT`s supply
    /// positional values and must match the column count exactly.
    pub fn materialize(&self) -> Result<(TableDef, Vec<Record>)> {
        let Some((first, rest)) = self.selects.split_first() else {
            return Err(Error::UnexpectedEof("SELECT".to_string()));
        };

        let mut columns = Vec::with_capacity(first.items.len());
        let mut first_row = Record::new();
        for item in &first.items {
            let alias = item
                .alias
                .as_ref()
                .ok_or_else(|| Error::MissingAlias(item.text.clone()))?;
            columns.push(Column::new(alias.clone(), item.value.inferred_type()));
            first_row.insert(alias.clone(), item.value.clone());
        }

        let mut rows = vec![first_row];
        for select in rest {
            if select.items.len() != columns.len() {
                return Err(Error::ColumnCountMismatch {
                    expected: columns.len(),
                    found: select.items.len(),
                });
            }
            let row = columns
                .iter()
                .zip(&select.items)
                .map(|(col, item)| (col.name.clone(), item.value.clone()))
                .collect();
            rows.push(row);
        }

        Ok((TableDef::new(self.table_name.clone(), columns), rows))
    }
}

/// DROP TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub table_name: String,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projection: Projection,
    pub table_name: String,
    pub where_clause: Option<WhereClause>,
}

/// The column list of a SELECT
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// All columns (*), in catalog order
    Wildcard,
    /// Named columns, used verbatim
    Columns(Vec<String>),
}

/// A single equality predicate `column = literal`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub value: Value,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Target columns; catalog order when omitted
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<WhereClause>,
}

/// Render a name, quoting it when it is not a plain word
pub fn format_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && Token::from_keyword(name).is_none();
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn join_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_values(values: &[Value]) -> String {
    values.iter().map(format_literal).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WHERE {} = {}",
            format_identifier(&self.column),
            format_literal(&self.value)
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable(s) => {
                let columns: Vec<String> = s
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", format_identifier(&c.name), c.data_type))
                    .collect();
                write!(
                    f,
                    "CREATE TABLE {} ({})",
                    format_identifier(&s.table_name),
                    columns.join(", ")
                )
            }
            Statement::CreateTableAsSelect(s) => {
                write!(f, "CREATE TABLE {} AS ", format_identifier(&s.table_name))?;
                for (i, select) in s.selects.iter().enumerate() {
                    if i > 0 {
                        write!(f, " UNION ALL ")?;
                    }
                    let items: Vec<String> = select
                        .items
                        .iter()
                        .map(|item| match &item.alias {
                            Some(alias) => format!(
                                "{} AS {}",
                                format_literal(&item.value),
                                format_identifier(alias)
                            ),
                            None => format_literal(&item.value),
                        })
                        .collect();
                    write!(f, "SELECT {}", items.join(", "))?;
                }
                Ok(())
            }
            Statement::DropTable(s) => {
                write!(f, "DROP TABLE {}", format_identifier(&s.table_name))
            }
            Statement::Select(s) => {
                let projection = match &s.projection {
                    Projection::Wildcard => "*".to_string(),
                    Projection::Columns(cols) => join_names(cols),
                };
                write!(
                    f,
                    "SELECT {} FROM {}",
                    projection,
                    format_identifier(&s.table_name)
                )?;
                if let Some(w) = &s.where_clause {
                    write!(f, " {}", w)?;
                }
                Ok(())
            }
            Statement::Insert(s) => {
                write!(f, "INSERT INTO {}", format_identifier(&s.table_name))?;
                if let Some(cols) = &s.columns {
                    write!(f, " ({})", join_names(cols))?;
                }
                let rows: Vec<String> = s
                    .rows
                    .iter()
                    .map(|row| format!("({})", join_values(row)))
                    .collect();
                write!(f, " VALUES {}", rows.join(", "))
            }
            Statement::Delete(s) => {
                write!(f, "DELETE FROM {}", format_identifier(&s.table_name))?;
                if let Some(w) = &s.where_clause {
                    write!(f, " {}", w)?;
                }
                Ok(())
            }
        }
    }
}
