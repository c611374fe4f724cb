use crate::expr::{ParseError, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number { value: f64, exponent: bool },
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Length in bytes of the numeric literal at the start of `src`, and whether it
/// carries an exponent. Returns `None` when `src` does not start with a literal.
///
/// Accepted forms: `12`, `1.5`, `1.`, `.5`, optionally followed by `e`/`E`, an
/// optional sign and at least one digit. An `e` that is not followed by digits is
/// not consumed.
pub(crate) fn scan_number(src: &str) -> Option<(usize, bool)> {
    let bytes = src.as_bytes();
    let mut pos = 0;
    let mut digits = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
        digits += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    let mut exponent = false;
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp_pos = pos + 1;
        if exp_pos < bytes.len() && matches!(bytes[exp_pos], b'+' | b'-') {
            exp_pos += 1;
        }
        let exp_digits_start = exp_pos;
        while exp_pos < bytes.len() && bytes[exp_pos].is_ascii_digit() {
            exp_pos += 1;
        }
        if exp_pos > exp_digits_start {
            pos = exp_pos;
            exponent = true;
        }
    }
    Some((pos, exponent))
}

pub fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let single = match ch {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token {
                kind,
                span: Span::new(start, start + 1),
            });
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let Some((len, exponent)) = scan_number(&src[start..]) else {
                return Err(ParseError::new(
                    "expected digits in number literal",
                    Span::new(start, start + 1),
                ));
            };
            let end = start + len;
            let text = &src[start..end];
            let value = text.parse::<f64>().map_err(|_| {
                ParseError::new(
                    format!("invalid number literal `{text}`"),
                    Span::new(start, end),
                )
            })?;
            while chars.peek().is_some_and(|&(idx, _)| idx < end) {
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Number { value, exponent },
                span: Span::new(start, end),
            });
            continue;
        }

        if is_ident_start(ch) {
            let mut end = start;
            while let Some(&(idx, next)) = chars.peek() {
                if !is_ident_continue(next) {
                    break;
                }
                end = idx + next.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Ident(src[start..end].to_string()),
                span: Span::new(start, end),
            });
            continue;
        }

        return Err(ParseError::new(
            format!("unexpected character `{ch}`"),
            Span::new(start, start + ch.len_utf8()),
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(src.len(), src.len()),
    });
    Ok(tokens)
}
