//! SQL module
//!
//! This module contains the SQL front end:
//! - Tokens and the lexer
//! - Literal coercion
//! - The statement AST and the parser

pub mod ast;
pub mod lexer;
pub mod literal;
pub mod parser;
pub mod token;

pub use ast::Statement;
pub use lexer::Lexer;
pub use literal::{format_literal, parse_literal};
pub use parser::{parse, parse_where_clause, Parser};
pub use token::Token;
