//! Formula front end: tokenizer, shunting-yard postfix conversion, and AST
//! construction.
//!
//! ```
//! use cellgraph_parse::{parse_formula, AstKind};
//!
//! let ast = parse_formula("=SUM(A1:A10)*2").unwrap();
//! assert!(matches!(ast.kind, AstKind::BinaryOp { .. }));
//! ```

pub mod ast;
pub mod postfix;
pub mod reference;
pub mod tokenizer;

pub use ast::{AstKind, AstNode, BuildError, build_ast};
pub use postfix::{PostfixToken, parse_postfix};
pub use reference::{InvalidReference, ReferenceType};
pub use tokenizer::{Associativity, Token, TokenKind, TokenSub, TokenizerError, tokenize};

use std::error::Error;
use std::fmt::{self, Display};

/// Anything that can go wrong turning formula text into an AST.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Tokenize(TokenizerError),
    MismatchedParentheses,
    UnknownOperator(String),
    UnexpectedToken(String),
    Build(BuildError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Tokenize(e) => write!(f, "{e}"),
            ParseError::MismatchedParentheses => write!(f, "mismatched parentheses"),
            ParseError::UnknownOperator(op) => write!(f, "unknown operator `{op}`"),
            ParseError::UnexpectedToken(t) => write!(f, "unexpected token `{t}`"),
            ParseError::Build(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Tokenize(e) => Some(e),
            ParseError::Build(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TokenizerError> for ParseError {
    fn from(e: TokenizerError) -> Self {
        ParseError::Tokenize(e)
    }
}

impl From<BuildError> for ParseError {
    fn from(e: BuildError) -> Self {
        ParseError::Build(e)
    }
}

/// Parse formula text (or plain cell text) all the way to an AST.
pub fn parse_formula(input: &str) -> Result<AstNode, ParseError> {
    let tokens = tokenize(input)?;
    let postfix = parse_postfix(&tokens)?;
    Ok(build_ast(postfix)?)
}
