//! Shunting-yard conversion from a token stream to postfix order.
//!
//! Function calls take a variable number of arguments, so alongside the
//! operator stack we track, per open call, how many arguments have been
//! sealed by separators (`arg_count`) and whether the current argument slot
//! holds a value (`were_values`). The closing paren combines the two into
//! the call's arity, which rides on the emitted function token.

use smallvec::{SmallVec, smallvec};

use crate::ParseError;
use crate::tokenizer::{Associativity, Token, TokenKind, TokenSub};

/// A token in postfix order. `arity` is populated only for function tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostfixToken {
    pub token: Token,
    pub arity: Option<u32>,
}

impl PostfixToken {
    fn plain(token: Token) -> Self {
        PostfixToken { token, arity: None }
    }
}

pub fn parse_postfix(tokens: &[Token]) -> Result<Vec<PostfixToken>, ParseError> {
    // A bare literal cell bypasses expression parsing entirely.
    if let [token] = tokens
        && token.kind == TokenKind::Literal
    {
        return Ok(vec![PostfixToken::plain(token.clone())]);
    }

    let mut output: Vec<PostfixToken> = Vec::with_capacity(tokens.len());
    let mut ops: SmallVec<[Token; 8]> = SmallVec::new();
    let mut arg_count: SmallVec<[u32; 4]> = SmallVec::new();
    // One slot for the top-level expression, one more per open function call.
    let mut were_values: SmallVec<[bool; 4]> = smallvec![false];

    for token in tokens {
        match (token.kind, token.sub) {
            (TokenKind::Whitespace, _) => {}

            (TokenKind::Operand, _) => {
                output.push(PostfixToken::plain(token.clone()));
                if let Some(top) = were_values.last_mut() {
                    *top = true;
                }
            }

            (TokenKind::Func, TokenSub::Open) => {
                ops.push(token.clone());
                arg_count.push(0);
                were_values.push(false);
            }

            (TokenKind::Paren, TokenSub::Open) => {
                ops.push(token.clone());
            }

            (TokenKind::Sep, TokenSub::Arg) => {
                loop {
                    match ops.pop() {
                        None => return Err(ParseError::MismatchedParentheses),
                        Some(top) if top.is_open() => {
                            ops.push(top);
                            break;
                        }
                        Some(top) => output.push(PostfixToken::plain(top)),
                    }
                }
                let had_value = were_values.pop().unwrap_or(false);
                if had_value && let Some(count) = arg_count.last_mut() {
                    *count += 1;
                }
                were_values.push(false);
            }

            (TokenKind::Sep, _) => {
                return Err(ParseError::UnexpectedToken(token.tvalue.clone()));
            }

            (TokenKind::OpPrefix | TokenKind::OpInfix | TokenKind::OpPostfix, _) => {
                let (prec, assoc) = token
                    .precedence()
                    .ok_or_else(|| ParseError::UnknownOperator(token.tvalue.clone()))?;
                loop {
                    let yields = match ops.last() {
                        Some(top) if top.is_operator() => match top.precedence() {
                            Some((top_prec, _)) => match assoc {
                                Associativity::Left => prec <= top_prec,
                                Associativity::Right => prec < top_prec,
                            },
                            None => false,
                        },
                        _ => false,
                    };
                    if !yields {
                        break;
                    }
                    if let Some(top) = ops.pop() {
                        output.push(PostfixToken::plain(top));
                    }
                }
                ops.push(token.clone());
            }

            (_, TokenSub::Close) => {
                loop {
                    let Some(top) = ops.pop() else {
                        return Err(ParseError::MismatchedParentheses);
                    };
                    if !top.is_open() {
                        output.push(PostfixToken::plain(top));
                        continue;
                    }
                    if top.kind == TokenKind::Func {
                        let sealed = arg_count.pop().unwrap_or(0);
                        let pending = were_values.pop().unwrap_or(false);
                        let arity = sealed + u32::from(pending);
                        output.push(PostfixToken {
                            token: top,
                            arity: Some(arity),
                        });
                        if let Some(outer) = were_values.last_mut() {
                            *outer = true;
                        }
                    }
                    // Grouping paren is discarded; its contents already
                    // flowed to the output.
                    break;
                }
            }

            _ => return Err(ParseError::UnexpectedToken(token.tvalue.clone())),
        }
    }

    while let Some(top) = ops.pop() {
        if top.is_open() {
            return Err(ParseError::MismatchedParentheses);
        }
        output.push(PostfixToken::plain(top));
    }
    Ok(output)
}
