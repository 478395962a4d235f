// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{Expr, Function};
use crate::number::Number;
use crate::value::Value;

use super::error::ExpressionParseError;

/// Nesting limit used by [`parse_expression`].
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 64;

/// Classification of a string appearing in a rule document.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateString {
    /// Plain string. `[[...` escapes have already been unescaped.
    Literal(String),
    /// Expression body without the surrounding brackets.
    Expression(String),
}

/// Decide whether a string is a template expression.
///
/// `"[...]"` is an expression, `"[[...]"` is the literal `"[...]"`.
pub fn classify(text: &str) -> TemplateString {
    if let Some(rest) = text.strip_prefix("[[") {
        let mut literal = String::with_capacity(text.len().saturating_sub(1));
        literal.push('[');
        literal.push_str(rest);
        return TemplateString::Literal(literal);
    }
    match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(body) => TemplateString::Expression(body.to_string()),
        None => TemplateString::Literal(text.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Number),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

struct Lexer<'a> {
    chars: core::iter::Peekable<core::str::CharIndices<'a>>,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
        }
    }

    fn next_token(&mut self) -> Result<Token, ExpressionParseError> {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            let _ = self.chars.next();
        }

        let Some((start, c)) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        match c {
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '[' => Ok(Token::LBracket),
            ']' => Ok(Token::RBracket),
            ',' => Ok(Token::Comma),
            '.' => Ok(Token::Dot),
            '\'' => self.read_string(start),
            c if c.is_ascii_digit() || c == '-' => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(idx, c)) = self.chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    end = idx + c.len_utf8();
                    let _ = self.chars.next();
                }
                Ok(Token::Ident(self.source[start..end].to_string()))
            }
            c => Err(ExpressionParseError::new(
                format!("unexpected character `{c}`"),
                start,
            )),
        }
    }

    fn read_string(&mut self, start: usize) -> Result<Token, ExpressionParseError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    // `''` is an escaped quote.
                    if matches!(self.chars.peek(), Some(&(_, '\''))) {
                        let _ = self.chars.next();
                        value.push('\'');
                    } else {
                        return Ok(Token::Str(value));
                    }
                }
                Some((_, c)) => value.push(c),
                None => {
                    return Err(ExpressionParseError::new("unterminated string literal", start))
                }
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Token, ExpressionParseError> {
        let mut end = start + 1;
        while let Some(&(idx, c)) = self.chars.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            end = idx + 1;
            let _ = self.chars.next();
        }
        let text = &self.source[start..end];
        text.parse::<Number>()
            .map(Token::Num)
            .map_err(|_| ExpressionParseError::new(format!("invalid number `{text}`"), start))
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.source.len())
    }
}

/// Recursive descent parser for template expression bodies.
///
/// Each call, member access and index adds a level of nesting. Parsing
/// fails once nesting exceeds `max_depth`, which also bounds recursion when
/// the resulting tree is evaluated or dropped.
pub struct ExpressionParser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    offset: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> ExpressionParser<'a> {
    /// Parse an expression body (the text between the outer brackets).
    pub fn parse(body: &'a str) -> Result<Expr, ExpressionParseError> {
        Self::parse_with_max_depth(body, DEFAULT_MAX_EXPRESSION_DEPTH)
    }

    pub fn parse_with_max_depth(
        body: &'a str,
        max_depth: usize,
    ) -> Result<Expr, ExpressionParseError> {
        let mut lexer = Lexer::new(body);
        let current = lexer.next_token()?;
        let offset = lexer.offset();
        let mut parser = Self {
            lexer,
            current,
            offset,
            depth: 0,
            max_depth,
        };
        let expr = parser.parse_expression()?;
        if parser.current != Token::Eof {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn error(&self, message: impl Into<String>) -> ExpressionParseError {
        ExpressionParseError::new(message, self.offset)
    }

    fn advance(&mut self) -> Result<Token, ExpressionParseError> {
        let next = self.lexer.next_token()?;
        self.offset = self.lexer.offset();
        Ok(core::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionParseError> {
        if &self.current != expected {
            return Err(self.error(format!(
                "expected {:?}, found {:?}",
                expected, self.current
            )));
        }
        self.advance()?;
        Ok(())
    }

    fn descend(&mut self) -> Result<(), ExpressionParseError> {
        self.depth = self.depth.saturating_add(1);
        if self.depth > self.max_depth {
            return Err(ExpressionParseError::too_deep(
                format!("expression nesting exceeds the limit of {}", self.max_depth),
                self.offset,
            ));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionParseError> {
        let entry = self.depth;
        let expr = self.parse_postfix();
        self.depth = entry;
        expr
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionParseError> {
        self.descend()?;
        let mut expr = self.parse_primary()?;
        loop {
            match self.current {
                Token::Dot => {
                    self.descend()?;
                    self.advance()?;
                    match self.advance()? {
                        Token::Ident(property) => {
                            expr = Expr::Member {
                                object: Box::new(expr),
                                property,
                            };
                        }
                        other => {
                            return Err(
                                self.error(format!("expected property name, found {other:?}"))
                            )
                        }
                    }
                }
                Token::LBracket => {
                    self.descend()?;
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionParseError> {
        match self.advance()? {
            Token::Str(s) => Ok(Expr::Literal {
                value: Value::from(s),
            }),
            Token::Num(n) => Ok(Expr::Literal {
                value: Value::from(n),
            }),
            Token::Ident(name) => {
                if self.current != Token::LParen {
                    return match name.as_str() {
                        "true" => Ok(Expr::Literal {
                            value: Value::Bool(true),
                        }),
                        "false" => Ok(Expr::Literal {
                            value: Value::Bool(false),
                        }),
                        "null" => Ok(Expr::Literal { value: Value::Null }),
                        _ => Err(self.error(format!("unexpected identifier `{name}`"))),
                    };
                }
                let function = Function::parse(&name).ok_or_else(|| {
                    ExpressionParseError::unsupported(format!("unknown function `{name}`"), self.offset)
                })?;
                self.advance()?;
                let arguments = self.parse_arguments()?;
                Ok(Expr::Call {
                    function,
                    arguments,
                })
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ExpressionParseError> {
        let mut arguments = Vec::new();
        if self.current == Token::RParen {
            self.advance()?;
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_expression()?);
            match self.advance()? {
                Token::Comma => continue,
                Token::RParen => return Ok(arguments),
                other => return Err(self.error(format!("expected `,` or `)`, found {other:?}"))),
            }
        }
    }
}

/// Parse an expression body into an AST.
pub fn parse_expression(body: &str) -> Result<Expr, ExpressionParseError> {
    ExpressionParser::parse(body)
}
