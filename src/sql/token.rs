//! SQL Token definitions
//!
//! This module defines all tokens that can appear in SQL statements. Only the
//! words the supported grammar relies on are keywords; every other word is an
//! identifier, so columns may be named `key`, `date` or `text`.

use std::fmt;

/// SQL Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ========== Keywords ==========
    Create,
    Drop,
    Table,
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Delete,
    As,
    Union,
    All,
    Null,

    // ========== Literals ==========
    /// Numeric literal, kept as written
    Number(String),
    /// String literal (single-quoted), unescaped
    StringLiteral(String),
    /// Double-quoted text: an identifier in name position, a string in value
    /// position
    QuotedText(String),
    /// Identifier (bare or backtick-quoted)
    Identifier(String),

    // ========== Operators ==========
    /// =
    Eq,
    /// <> or !=
    Neq,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    Lte,
    /// >=
    Gte,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Asterisk,
    /// /
    Slash,

    // ========== Delimiters ==========
    /// (
    LParen,
    /// )
    RParen,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// .
    Dot,

    // ========== Special ==========
    /// End of input
    Eof,
}

impl Token {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Create
                | Token::Drop
                | Token::Table
                | Token::Select
                | Token::From
                | Token::Where
                | Token::Insert
                | Token::Into
                | Token::Values
                | Token::Delete
                | Token::As
                | Token::Union
                | Token::All
                | Token::Null
        )
    }

    /// Try to parse a keyword from a string
    pub fn from_keyword(s: &str) -> Option<Token> {
        match s.to_uppercase().as_str() {
            "CREATE" => Some(Token::Create),
            "DROP" => Some(Token::Drop),
            "TABLE" => Some(Token::Table),
            "SELECT" => Some(Token::Select),
            "FROM" => Some(Token::From),
            "WHERE" => Some(Token::Where),
            "INSERT" => Some(Token::Insert),
            "INTO" => Some(Token::Into),
            "VALUES" => Some(Token::Values),
            "DELETE" => Some(Token::Delete),
            "AS" => Some(Token::As),
            "UNION" => Some(Token::Union),
            "ALL" => Some(Token::All),
            "NULL" => Some(Token::Null),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Create => write!(f, "CREATE"),
            Token::Drop => write!(f, "DROP"),
            Token::Table => write!(f, "TABLE"),
            Token::Select => write!(f, "SELECT"),
            Token::From => write!(f, "FROM"),
            Token::Where => write!(f, "WHERE"),
            Token::Insert => write!(f, "INSERT"),
            Token::Into => write!(f, "INTO"),
            Token::Values => write!(f, "VALUES"),
            Token::Delete => write!(f, "DELETE"),
            Token::As => write!(f, "AS"),
            Token::Union => write!(f, "UNION"),
            Token::All => write!(f, "ALL"),
            Token::Null => write!(f, "NULL"),
            Token::Number(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "'{}'", s),
            Token::QuotedText(s) => write!(f, "\"{}\"", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Eq => write!(f, "="),
            Token::Neq => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Lte => write!(f, "<="),
            Token::Gte => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Asterisk => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// A token with its byte range in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}
