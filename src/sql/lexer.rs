//! SQL Lexer (Tokenizer)
//!
//! This module converts SQL strings into a stream of tokens, each carrying
//! its byte range in the source so the parser can quote offending fragments
//! and hand literal text to the value coercion layer.

use super::literal;
use super::token::{Spanned, Token};
use crate::error::{Error, Result};

/// SQL Lexer
pub struct Lexer {
    /// Input characters with their byte offsets
    input: Vec<(usize, char)>,
    /// Byte length of the input
    len: usize,
    /// Current position in input (character index)
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.char_indices().collect(),
            len: input.len(),
            position: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            self.skip_comments();
            self.skip_whitespace();

            let start = self.offset();
            let token = self.next_token()?;
            let end = self.offset();
            let done = token == Token::Eof;
            tokens.push(Spanned { token, start, end });
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    fn next_token(&mut self) -> Result<Token> {
        if self.is_at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        // Single character tokens
        let token = match ch {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '+' => Some(Token::Plus),
            '*' => Some(Token::Asterisk),
            '/' => Some(Token::Slash),
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = token {
            self.advance();
            return Ok(token);
        }

        match ch {
            '-' => {
                // Negative number
                if matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '.') {
                    return self.read_number();
                }
                self.advance();
                Ok(Token::Minus)
            }
            '.' => {
                if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    return self.read_number();
                }
                self.advance();
                Ok(Token::Dot)
            }
            '<' => {
                self.advance();
                match self.current() {
                    Some('=') => {
                        self.advance();
                        Ok(Token::Lte)
                    }
                    Some('>') => {
                        self.advance();
                        Ok(Token::Neq)
                    }
                    _ => Ok(Token::Lt),
                }
            }
            '>' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    return Ok(Token::Gte);
                }
                Ok(Token::Gt)
            }
            '!' => {
                let start = self.offset();
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    return Ok(Token::Neq);
                }
                Err(Error::UnexpectedCharacter('!', start))
            }
            '\'' => self.read_quoted('\'').map(Token::StringLiteral),
            '"' => self.read_quoted('"').map(Token::QuotedText),
            '`' => self.read_quoted('`').map(Token::Identifier),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c => Err(Error::UnexpectedCharacter(c, self.offset())),
        }
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the current character
    fn current_char(&self) -> char {
        self.input[self.position].1
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).map(|(_, c)| *c)
    }

    /// Peek at the next character
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).map(|(_, c)| *c)
    }

    /// Byte offset of the current position
    fn offset(&self) -> usize {
        self.input
            .get(self.position)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.len)
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Skip SQL comments (-- and /* */)
    fn skip_comments(&mut self) {
        if self.is_at_end() {
            return;
        }

        // Single line comment: --
        if self.current_char() == '-' && self.peek_char() == Some('-') {
            while !self.is_at_end() && self.current_char() != '\n' {
                self.advance();
            }
            self.skip_whitespace();
            self.skip_comments();
            return;
        }

        // Multi-line comment: /* */
        if self.current_char() == '/' && self.peek_char() == Some('*') {
            self.advance(); // skip /
            self.advance(); // skip *

            while !self.is_at_end() {
                if self.current_char() == '*' && self.peek_char() == Some('/') {
                    self.advance(); // skip *
                    self.advance(); // skip /
                    break;
                }
                self.advance();
            }
            self.skip_whitespace();
            self.skip_comments();
        }
    }

    /// Read quoted text; a doubled quote character is an escaped quote
    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let start = self.offset();
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch == quote {
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // skip closing quote
                    return Ok(value);
                }
            } else {
                value.push(ch);
                self.advance();
            }
        }

        Err(Error::UnterminatedString(start))
    }

    /// Read a number (integer or real, optionally signed)
    fn read_number(&mut self) -> Result<Token> {
        let mut value = String::new();
        let mut seen_dot = false;

        if self.current() == Some('-') {
            value.push('-');
            self.advance();
        }

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                value.push(ch);
                self.advance();
            } else if (ch == 'e' || ch == 'E') && self.exponent_follows() {
                // Scientific notation
                value.push(ch);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current() {
                    value.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }

        // A number glued to letters (e.g. `12abc`) is not a number
        if matches!(self.current(), Some(c) if c.is_alphabetic() || c == '_') {
            while matches!(self.current(), Some(c) if c.is_alphanumeric() || c == '_') {
                value.push(self.current_char());
                self.advance();
            }
            return Err(Error::InvalidNumber(value));
        }

        match literal::parse_number(&value) {
            Some(_) => Ok(Token::Number(value)),
            None => Err(Error::InvalidNumber(value)),
        }
    }

    fn exponent_follows(&self) -> bool {
        let after = |n: usize| self.input.get(self.position + n).map(|(_, c)| *c);
        match after(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => matches!(after(2), Some(c) if c.is_ascii_digit()),
            _ => false,
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut value = String::new();

        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::from_keyword(&value).unwrap_or(Token::Identifier(value))
    }
}

/// Tokenize a SQL string
pub fn tokenize(sql: &str) -> Result<Vec<Spanned>> {
    Lexer::new(sql).tokenize()
}
