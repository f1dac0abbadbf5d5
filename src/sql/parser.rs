//! SQL Parser
//!
//! A recursive-descent parser over the token stream, producing one
//! [`Statement`] per input. Keywords match case-insensitively; names and
//! literals keep their case. Value positions hand the literal's source text
//! to [`literal::parse_literal`], so values inside statements coerce exactly
//! like standalone literals.

use tracing::warn;

use super::ast::*;
use super::lexer::Lexer;
use super::literal;
use super::token::{Spanned, Token};
use crate::catalog::{Column, DataType};
use crate::error::{Error, Result};

/// SQL Parser
pub struct Parser {
    sql: String,
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a SQL string
    pub fn new(sql: &str) -> Result<Self> {
        let mut lexer = Lexer::new(sql);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            sql: sql.to_string(),
            tokens,
            position: 0,
        })
    }

    /// Parse a single SQL statement, allowing trailing semicolons
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;

        while self.check(&Token::Semicolon) {
            self.advance();
        }
        if !self.is_at_end() {
            return Err(self.unexpected("end of statement"));
        }

        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match (self.current(), self.peek()) {
            (Token::Create, Token::Table) => self.parse_create_table(),
            (Token::Drop, Token::Table) => self.parse_drop().map(Statement::DropTable),
            (Token::Select, _) => self.parse_select().map(Statement::Select),
            (Token::Insert, Token::Into) => self.parse_insert().map(Statement::Insert),
            (Token::Delete, Token::From) => self.parse_delete().map(Statement::Delete),
            (Token::Eof, _) => Err(Error::UnexpectedEof("a statement".to_string())),
            _ => Err(Error::UnsupportedCommand(self.fragment(self.position))),
        }
    }

    // ========== CREATE TABLE ==========

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect(&Token::Create)?;
        self.expect(&Token::Table)?;
        let table_name = self.expect_name()?;

        if self.check(&Token::As) {
            self.advance();
            let selects = self.parse_union_selects()?;
            return Ok(Statement::CreateTableAsSelect(CreateTableAsStatement {
                table_name,
                selects,
            }));
        }

        self.expect(&Token::LParen)?;
        let mut columns = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                columns.push(self.parse_column_def()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&Token::RParen)?;

        Ok(Statement::CreateTable(CreateTableStatement {
            table_name,
            columns,
        }))
    }

    fn parse_column_def(&mut self) -> Result<Column> {
        let name = match self.current().clone() {
            Token::StringLiteral(name) => {
                self.advance();
                name
            }
            _ => self.expect_name()?,
        };

        let type_name = match self.current().clone() {
            Token::Identifier(t) | Token::QuotedText(t) | Token::StringLiteral(t) => {
                self.advance();
                t
            }
            _ => return Err(self.unexpected("column type")),
        };

        let mut args = Vec::new();
        if self.check(&Token::LParen) {
            self.advance();
            loop {
                args.push(self.expect_u32()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(&Token::RParen)?;
        }

        // Column constraints (PRIMARY KEY, NOT NULL, ...) are accepted and
        // ignored: the first column is always the key.
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::Comma | Token::RParen if depth == 0 => break,
                Token::Eof => break,
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }

        Ok(Column::new(name, DataType::from_parts(&type_name, &args)))
    }

    /// `SELECT items [UNION ALL SELECT items]*`
    fn parse_union_selects(&mut self) -> Result<Vec<SelectValues>> {
        let mut selects = Vec::new();
        loop {
            self.expect(&Token::Select)?;
            let mut items = Vec::new();
            loop {
                items.push(self.parse_select_item()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            selects.push(SelectValues { items });

            if !self.check(&Token::Union) {
                break;
            }
            self.advance();
            self.expect(&Token::All)?;
        }
        Ok(selects)
    }

    /// An expression with an optional trailing `AS alias`
    ///
    /// Anything before the alias is coerced as one literal, so an expression
    /// that is not a plain literal is kept as opaque text.
    fn parse_select_item(&mut self) -> Result<SelectItem> {
        let start = self.position;
        let end = self.scan_item(&[Token::Comma, Token::Union, Token::Semicolon]);
        if end == start {
            return Err(self.unexpected("expression"));
        }

        let mut value_end = end;
        let mut alias = None;
        if end - start >= 3 && self.tokens[end - 2].token == Token::As {
            if let Some(name) = name_of(&self.tokens[end - 1].token) {
                alias = Some(name);
                value_end = end - 2;
            }
        }

        let text = self.source(start, value_end).to_string();
        let value = literal::parse_literal(&text);
        self.position = end;
        Ok(SelectItem { text, value, alias })
    }

    // ========== DROP TABLE ==========

    fn parse_drop(&mut self) -> Result<DropTableStatement> {
        self.expect(&Token::Drop)?;
        self.expect(&Token::Table)?;

        // DROP of a missing table is already a no-op, so IF EXISTS is accepted
        let if_exists = matches!(self.peek(), Token::Identifier(w) if w.eq_ignore_ascii_case("EXISTS"));
        if self.check_word("IF") && if_exists {
            self.advance();
            self.advance();
        }

        let table_name = self.expect_name()?;
        Ok(DropTableStatement { table_name })
    }

    // ========== SELECT ==========

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect(&Token::Select)?;

        let projection = if self.check(&Token::Asterisk) {
            self.advance();
            Projection::Wildcard
        } else {
            let mut columns = Vec::new();
            loop {
                columns.push(self.expect_name()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            Projection::Columns(columns)
        };

        self.expect(&Token::From)?;
        let table_name = self.expect_name()?;
        let where_clause = self.parse_optional_where()?;

        Ok(SelectStatement {
            projection,
            table_name,
            where_clause,
        })
    }

    // ========== INSERT ==========

    fn parse_insert(&mut self) -> Result<InsertStatement> {
        self.expect(&Token::Insert)?;
        self.expect(&Token::Into)?;

        let table_name = self.expect_name()?;

        // Optional column list
        let columns = if self.check(&Token::LParen) {
            self.advance();
            let mut cols = Vec::new();
            loop {
                let col = match self.current().clone() {
                    Token::StringLiteral(name) => {
                        self.advance();
                        name
                    }
                    _ => self.expect_name()?,
                };
                cols.push(col);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(&Token::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(&Token::Values)?;

        let mut rows = Vec::new();
        loop {
            self.expect(&Token::LParen)?;
            let mut row = Vec::new();
            loop {
                let start = self.position;
                let end = self.scan_item(&[Token::Comma, Token::RParen, Token::Semicolon]);
                if end == start {
                    return Err(self.unexpected("value"));
                }
                row.push(literal::parse_literal(self.source(start, end)));
                self.position = end;
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(&Token::RParen)?;
            rows.push(row);

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(InsertStatement {
            table_name,
            columns,
            rows,
        })
    }

    // ========== DELETE ==========

    fn parse_delete(&mut self) -> Result<DeleteStatement> {
        self.expect(&Token::Delete)?;
        self.expect(&Token::From)?;
        let table_name = self.expect_name()?;
        let where_clause = self.parse_optional_where()?;

        Ok(DeleteStatement {
            table_name,
            where_clause,
        })
    }

    // ========== WHERE ==========

    /// Parse `[WHERE ...]` up to the end of the statement
    ///
    /// A clause that is not a single `column = literal` equality is dropped
    /// with a warning and the statement proceeds as if it had none.
    fn parse_optional_where(&mut self) -> Result<Option<WhereClause>> {
        if !self.check(&Token::Where) {
            return Ok(None);
        }
        self.advance();

        let start = self.position;
        while !self.is_at_end() && !self.check(&Token::Semicolon) {
            self.advance();
        }
        let end = self.position;

        let clause = where_from_tokens(&self.tokens[start..end], &self.sql);
        if clause.is_none() {
            warn!(
                clause = self.source(start, end),
                "WHERE clause is not a single equality and was ignored"
            );
        }
        Ok(clause)
    }

    // ========== Helpers ==========

    /// Index of the first token at parenthesis depth 0 that is one of
    /// `stops`, starting at the current position
    fn scan_item(&self, stops: &[Token]) -> usize {
        let mut depth = 0usize;
        let mut i = self.position;
        while let Some(spanned) = self.tokens.get(i) {
            let token = &spanned.token;
            if *token == Token::Eof {
                break;
            }
            if depth == 0 && stops.iter().any(|s| s == token) {
                break;
            }
            match token {
                Token::LParen => depth += 1,
                Token::RParen if depth > 0 => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        i
    }

    /// Source text covered by tokens `start..end`
    fn source(&self, start: usize, end: usize) -> &str {
        if end <= start {
            return "";
        }
        &self.sql[self.tokens[start].start..self.tokens[end - 1].end]
    }

    /// Source text of a single token
    fn fragment(&self, index: usize) -> String {
        self.source(index, index + 1).to_string()
    }

    fn unexpected(&self, expected: &str) -> Error {
        if self.is_at_end() {
            Error::UnexpectedEof(expected.to_string())
        } else {
            Error::UnexpectedToken {
                expected: expected.to_string(),
                found: self.fragment(self.position),
            }
        }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.position + 1)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(self.current(), Token::Identifier(w) if w.eq_ignore_ascii_case(word))
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    /// A table or column name: bare, double-quoted or backtick-quoted
    fn expect_name(&mut self) -> Result<String> {
        match name_of(self.current()) {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    fn expect_u32(&mut self) -> Result<u32> {
        if let Token::Number(n) = self.current() {
            if let Ok(n) = n.parse::<u32>() {
                self.advance();
                return Ok(n);
            }
        }
        Err(self.unexpected("a non-negative integer"))
    }
}

fn name_of(token: &Token) -> Option<String> {
    match token {
        Token::Identifier(name) | Token::QuotedText(name) => Some(name.clone()),
        _ => None,
    }
}

/// Match `identifier = literal`, where literal is a quoted string or a number
///
/// `source` is the text the token spans index into.
fn where_from_tokens(tokens: &[Spanned], source: &str) -> Option<WhereClause> {
    let [column, op, value] = tokens else {
        return None;
    };
    let Token::Identifier(column) = &column.token else {
        return None;
    };
    if op.token != Token::Eq {
        return None;
    }
    match &value.token {
        Token::StringLiteral(_) | Token::QuotedText(_) | Token::Number(_) => {}
        _ => return None,
    }
    Some(WhereClause {
        column: column.clone(),
        value: literal::parse_literal(&source[value.start..value.end]),
    })
}

/// Parse a single SQL statement
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql)?.parse()
}

/// Parse WHERE clause text (without the `WHERE` keyword)
///
/// Returns `None` unless the text is exactly one `identifier = literal`
/// equality with a quoted string or number on the right.
pub fn parse_where_clause(text: &str) -> Option<WhereClause> {
    let tokens = Lexer::new(text).tokenize().ok()?;
    let body = tokens.split_last().map(|(_, body)| body).unwrap_or(&[]);
    where_from_tokens(body, text)
}
