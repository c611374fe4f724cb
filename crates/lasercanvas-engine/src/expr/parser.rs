use crate::expr::lexer::{lex, Token, TokenKind};
use crate::expr::{BinaryOp, Constant, Expr, MathFn, Span};
use thiserror::Error;

/// Limits enforced by the parser.
///
/// Expressions are typed by hand into property fields, so these are generous, but
/// they keep pathological input from overflowing the stack during parsing or
/// evaluation.
pub const MAX_EXPRESSION_CHARS: usize = 1_024;
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at {}..{})", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Parses an expression over `+ - * /`, parentheses, unary signs, one-argument
/// math functions, named constants, and variables.
pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let char_len = src.chars().count();
    if char_len > MAX_EXPRESSION_CHARS {
        return Err(ParseError::new(
            format!("expression exceeds the {MAX_EXPRESSION_CHARS}-character limit (got {char_len})"),
            Span::new(0, src.len()),
        ));
    }

    let tokens = lex(src)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_sum()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        // `lex` always terminates the stream with `Eof`, and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => Ok(()),
            _ => Err(ParseError::new("unexpected trailing input", token.span)),
        }
    }

    fn enter(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                format!("expression nests deeper than {MAX_NESTING_DEPTH} levels"),
                span,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let op_span = self.bump().span;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary {
                op,
                op_span,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            let op_span = self.bump().span;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                op_span,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::Minus => {
                let sign = self.bump().span;
                self.enter(sign)?;
                let operand = self.parse_unary()?;
                self.leave();
                let span = sign.cover(operand.span());
                Ok(Expr::Neg {
                    operand: Box::new(operand),
                    span,
                })
            }
            // Unary plus is accepted and dropped.
            TokenKind::Plus => {
                let sign = self.bump().span;
                self.enter(sign)?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(operand)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.bump();
        match token.kind {
            TokenKind::Number { value, exponent } => Ok(Expr::Number {
                value,
                exponent,
                span: token.span,
            }),
            TokenKind::LParen => {
                self.enter(token.span)?;
                let inner = self.parse_sum()?;
                self.leave();
                self.expect_rparen(token.span)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.parse_identifier(name, token.span),
            TokenKind::Eof => Err(ParseError::new("unexpected end of expression", token.span)),
            _ => Err(ParseError::new("expected a value", token.span)),
        }
    }

    fn parse_identifier(&mut self, name: String, span: Span) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::LParen {
            let Some(function) = MathFn::from_name(&name) else {
                return Err(ParseError::new(format!("unknown function `{name}`"), span));
            };
            let open = self.bump().span;
            self.enter(open)?;
            let arg = self.parse_sum()?;
            self.leave();
            let close = self.expect_rparen(open)?;
            return Ok(Expr::Call {
                function,
                arg: Box::new(arg),
                span: span.cover(close),
            });
        }

        if let Some(constant) = Constant::from_name(&name) {
            return Ok(Expr::Constant { constant, span });
        }
        if MathFn::from_name(&name).is_some() {
            return Err(ParseError::new(
                format!("function `{name}` requires a parenthesized argument"),
                span,
            ));
        }
        Ok(Expr::Variable { name, span })
    }

    fn expect_rparen(&mut self, open: Span) -> Result<Span, ParseError> {
        match self.peek().kind {
            TokenKind::RParen => Ok(self.bump().span),
            TokenKind::Eof => Err(ParseError::new("unclosed parenthesis", open)),
            _ => Err(ParseError::new("expected `)`", self.peek().span)),
        }
    }
}
