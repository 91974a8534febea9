//! Postfix-to-AST construction.
//!
//! A single left-to-right pass over the postfix stream with an operand
//! stack. Every stack underflow means the operator was short of operands and
//! surfaces as an [`BuildError::ArityMismatch`].

use cellgraph_common::{CellError, LiteralValue};
use std::error::Error;
use std::fmt::{self, Display};

use crate::postfix::PostfixToken;
use crate::reference::{InvalidReference, ReferenceType};
use crate::tokenizer::{TokenKind, TokenSub};

#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    EmptyExpression,
    ArityMismatch {
        op: String,
        expected: usize,
        found: usize,
    },
    Reference(InvalidReference),
    InvalidLiteral(String),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyExpression => write!(f, "formula has no expression"),
            BuildError::ArityMismatch {
                op,
                expected,
                found,
            } => write!(
                f,
                "`{op}` needs {expected} operand(s) but found {found}"
            ),
            BuildError::Reference(e) => write!(f, "{e}"),
            BuildError::InvalidLiteral(s) => write!(f, "cannot parse literal `{s}`"),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Reference(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidReference> for BuildError {
    fn from(e: InvalidReference) -> Self {
        BuildError::Reference(e)
    }
}

/// One node of the abstract syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    Literal(LiteralValue),
    Reference {
        /// The reference exactly as written, for diagnostics.
        original: String,
        reference: ReferenceType,
    },
    UnaryOp {
        op: String,
        expr: Box<AstNode>,
    },
    BinaryOp {
        op: String,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    Function {
        name: String,
        args: Vec<AstNode>,
    },
}

impl AstNode {
    pub fn literal(value: LiteralValue) -> Self {
        AstNode {
            kind: AstKind::Literal(value),
        }
    }

    /// Collect every reference in the tree, in left-to-right source order.
    /// Duplicates are kept; the graph builder deduplicates.
    pub fn references(&self) -> Vec<&ReferenceType> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a ReferenceType>) {
        match &self.kind {
            AstKind::Literal(_) => {}
            AstKind::Reference { reference, .. } => out.push(reference),
            AstKind::UnaryOp { expr, .. } => expr.collect_references(out),
            AstKind::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            AstKind::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }
}

pub fn build_ast(postfix: Vec<PostfixToken>) -> Result<AstNode, BuildError> {
    let mut stack: Vec<AstNode> = Vec::new();

    for item in postfix {
        let token = item.token;
        match (token.kind, token.sub) {
            (TokenKind::Literal, _) => {
                stack.push(AstNode::literal(LiteralValue::Text(token.tvalue)));
            }

            (TokenKind::Operand, sub) => stack.push(operand_node(sub, token.tvalue)?),

            (TokenKind::OpPrefix | TokenKind::OpPostfix, _) => {
                let expr = stack.pop().ok_or_else(|| BuildError::ArityMismatch {
                    op: token.tvalue.clone(),
                    expected: 1,
                    found: 0,
                })?;
                stack.push(AstNode {
                    kind: AstKind::UnaryOp {
                        op: token.tvalue,
                        expr: Box::new(expr),
                    },
                });
            }

            (TokenKind::OpInfix, _) => {
                let right = stack.pop();
                let left = stack.pop();
                let (Some(left), Some(right)) = (left, right) else {
                    return Err(BuildError::ArityMismatch {
                        op: token.tvalue.clone(),
                        expected: 2,
                        found: stack.len(),
                    });
                };
                stack.push(AstNode {
                    kind: AstKind::BinaryOp {
                        op: token.tvalue,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                });
            }

            (TokenKind::Func, _) => {
                let arity = item.arity.unwrap_or(0) as usize;
                if stack.len() < arity {
                    return Err(BuildError::ArityMismatch {
                        op: token.func_name().to_string(),
                        expected: arity,
                        found: stack.len(),
                    });
                }
                let args = stack.split_off(stack.len() - arity);
                stack.push(AstNode {
                    kind: AstKind::Function {
                        name: token.func_name().to_ascii_uppercase(),
                        args,
                    },
                });
            }

            _ => {
                return Err(BuildError::InvalidLiteral(token.tvalue));
            }
        }
    }

    let root = stack.pop().ok_or(BuildError::EmptyExpression)?;
    if !stack.is_empty() {
        // leftover operands mean some operator was missing
        return Err(BuildError::ArityMismatch {
            op: "<expression>".to_string(),
            expected: 1,
            found: stack.len() + 1,
        });
    }
    Ok(root)
}

fn operand_node(sub: TokenSub, text: String) -> Result<AstNode, BuildError> {
    let node = match sub {
        TokenSub::Number => {
            let n: f64 = text
                .parse()
                .map_err(|_| BuildError::InvalidLiteral(text.clone()))?;
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 && !text.contains(['.', 'e', 'E']) {
                AstNode::literal(LiteralValue::Int(n as i64))
            } else {
                AstNode::literal(LiteralValue::Number(n))
            }
        }
        TokenSub::Text => {
            let inner = text
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| BuildError::InvalidLiteral(text.clone()))?;
            AstNode::literal(LiteralValue::Text(inner.replace("\"\"", "\"")))
        }
        TokenSub::Logical => {
            AstNode::literal(LiteralValue::Boolean(text.eq_ignore_ascii_case("TRUE")))
        }
        TokenSub::Error => AstNode::literal(LiteralValue::Error(CellError::from_error_string(
            &text,
        ))),
        TokenSub::Range => {
            let reference = ReferenceType::from_string(&text)?;
            AstNode {
                kind: AstKind::Reference {
                    original: text,
                    reference,
                },
            }
        }
        _ => return Err(BuildError::InvalidLiteral(text)),
    };
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postfix::parse_postfix;
    use crate::tokenizer::tokenize;

    fn ast(formula: &str) -> AstNode {
        build_ast(parse_postfix(&tokenize(formula).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn number_literals_prefer_int() {
        assert_eq!(ast("=42").kind, AstKind::Literal(LiteralValue::Int(42)));
        assert_eq!(
            ast("=4.5").kind,
            AstKind::Literal(LiteralValue::Number(4.5))
        );
        assert_eq!(
            ast("=1e3").kind,
            AstKind::Literal(LiteralValue::Number(1000.0))
        );
    }

    #[test]
    fn string_literal_unescapes() {
        assert_eq!(
            ast("=\"he said \"\"hi\"\"\"").kind,
            AstKind::Literal(LiteralValue::Text("he said \"hi\"".to_string()))
        );
    }

    #[test]
    fn binary_tree_shape() {
        let node = ast("=1+2*3");
        let AstKind::BinaryOp { op, left, right } = node.kind else {
            panic!("expected binary op");
        };
        assert_eq!(op, "+");
        assert_eq!(left.kind, AstKind::Literal(LiteralValue::Int(1)));
        assert!(matches!(right.kind, AstKind::BinaryOp { .. }));
    }

    #[test]
    fn function_args_in_source_order() {
        let node = ast("=IF(A1,2,3)");
        let AstKind::Function { name, args } = node.kind else {
            panic!("expected function");
        };
        assert_eq!(name, "IF");
        assert_eq!(args.len(), 3);
        assert!(matches!(args[0].kind, AstKind::Reference { .. }));
        assert_eq!(args[1].kind, AstKind::Literal(LiteralValue::Int(2)));
        assert_eq!(args[2].kind, AstKind::Literal(LiteralValue::Int(3)));
    }

    #[test]
    fn function_name_is_uppercased() {
        let node = ast("=sum(A1)");
        let AstKind::Function { name, .. } = node.kind else {
            panic!("expected function");
        };
        assert_eq!(name, "SUM");
    }

    #[test]
    fn references_collected_in_order() {
        let node = ast("=A1+SUM(B1:B5,C2)");
        let refs: Vec<String> = node.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, ["A1", "B1:B5", "C2"]);
    }

    #[test]
    fn plain_text_cell_is_a_text_literal() {
        let node = build_ast(parse_postfix(&tokenize("hello").unwrap()).unwrap()).unwrap();
        assert_eq!(
            node.kind,
            AstKind::Literal(LiteralValue::Text("hello".to_string()))
        );
    }

    #[test]
    fn empty_formula_is_an_error() {
        let err = build_ast(parse_postfix(&tokenize("=").unwrap()).unwrap());
        assert_eq!(err, Err(BuildError::EmptyExpression));
    }
}
