//! Restricted arithmetic expressions: lexer, recursive-descent parser,
//! allow-list validation, tree evaluation, and structure-preserving edits.

mod ast;
mod eval;
mod increment;
pub(crate) mod lexer;
mod parser;
pub mod vocabulary;

pub use ast::{BinaryOp, Constant, Expr, MathFn, Span};
pub use eval::{evaluate, Bindings, NoBindings};
pub use increment::increment_expression;
pub use lexer::{lex, Token, TokenKind};
pub use parser::{parse_expression, ParseError, MAX_EXPRESSION_CHARS, MAX_NESTING_DEPTH};
