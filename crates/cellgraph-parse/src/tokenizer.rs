//! Formula tokenizer.
//!
//! Splits `=SUM(A1:B2)+3` style text into typed tokens: operands, operators
//! (prefix/infix/postfix), function openers/closers, grouping parentheses,
//! and argument separators. Text that does not start with `=` is a single
//! `Literal` token and never reaches the expression parser proper.

use std::error::Error;
use std::fmt::{self, Display};

static ERROR_CODES: &[&str] = &[
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#CIRC!",
];

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tokenizer error at byte {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Whole-cell text that is not a formula (no leading `=`).
    Literal,
    Operand,
    Func,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSub {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub tvalue: String,
    pub kind: TokenKind,
    pub sub: TokenSub,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?}/{:?} {}>", self.kind, self.sub, self.tvalue)
    }
}

impl Token {
    pub fn new(tvalue: impl Into<String>, kind: TokenKind, sub: TokenSub) -> Self {
        Token {
            tvalue: tvalue.into(),
            kind,
            sub,
        }
    }

    /// Classify a bare operand by inspecting its text.
    pub fn operand(tvalue: String) -> Self {
        let sub = if tvalue.starts_with('"') {
            TokenSub::Text
        } else if tvalue.starts_with('#') {
            TokenSub::Error
        } else if tvalue.eq_ignore_ascii_case("TRUE") || tvalue.eq_ignore_ascii_case("FALSE") {
            TokenSub::Logical
        } else if tvalue.parse::<f64>().is_ok() {
            TokenSub::Number
        } else {
            TokenSub::Range
        };
        Token::new(tvalue, TokenKind::Operand, sub)
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::OpPrefix | TokenKind::OpInfix | TokenKind::OpPostfix
        )
    }

    pub fn is_open(&self) -> bool {
        self.sub == TokenSub::Open
    }

    /// Function name without the trailing `(`.
    pub fn func_name(&self) -> &str {
        debug_assert_eq!(self.kind, TokenKind::Func);
        self.tvalue.strip_suffix('(').unwrap_or(&self.tvalue)
    }

    /// Precedence table. Higher binds tighter; prefix minus uses the `u`
    /// key. Range `:` never reaches here — it is folded into reference
    /// operands by the lexer — and the union comma is unsupported, so an
    /// operator without a row is an `UnknownOperator` in the parser.
    pub fn precedence(&self) -> Option<(u8, Associativity)> {
        let op = if self.kind == TokenKind::OpPrefix {
            "u"
        } else {
            self.tvalue.as_str()
        };

        match op {
            "u" => Some((7, Associativity::Right)),
            "%" => Some((6, Associativity::Left)),
            "^" => Some((5, Associativity::Left)),
            "*" | "/" => Some((4, Associativity::Left)),
            "+" | "-" => Some((3, Associativity::Left)),
            "&" => Some((2, Associativity::Left)),
            "=" | "<" | ">" | "<=" | ">=" | "<>" => Some((1, Associativity::Left)),
            _ => None,
        }
    }
}

/// Tokenize one formula. Unbalanced parentheses and unterminated strings are
/// reported here; everything structural beyond that is the parser's problem.
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizerError> {
    Lexer::new(formula).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    pending: String,
    out: Vec<Token>,
    /// Stack of openers currently unmatched (Func or Paren).
    opens: Vec<TokenKind>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            pending: String::new(),
            out: Vec::with_capacity(src.len() / 2),
            opens: Vec::new(),
        }
    }

    fn err(&self, message: impl Into<String>) -> TokenizerError {
        TokenizerError {
            message: message.into(),
            pos: self.pos,
        }
    }

    fn byte(&self) -> u8 {
        self.src.as_bytes()[self.pos]
    }

    fn flush_operand(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.out.push(Token::operand(text));
        }
    }

    /// Last token that is not whitespace, used to disambiguate `+`/`-`.
    fn last_significant(&self) -> Option<&Token> {
        self.out
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Whitespace)
    }

    fn run(mut self) -> Result<Vec<Token>, TokenizerError> {
        if self.src.is_empty() {
            return Ok(self.out);
        }
        if !self.src.starts_with('=') {
            self.out
                .push(Token::new(self.src, TokenKind::Literal, TokenSub::None));
            return Ok(self.out);
        }

        self.pos = 1;
        while self.pos < self.src.len() {
            if self.take_scientific_sign() {
                continue;
            }

            match self.byte() {
                b'"' => self.take_string()?,
                b'\'' => self.take_quoted_sheet()?,
                b'#' => self.take_error_literal()?,
                b' ' | b'\n' => self.take_whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.take_operator()
                }
                b'(' => self.take_opener(),
                b')' => self.take_closer()?,
                b'{' | b'}' => return Err(self.err("array literals are not supported")),
                b',' | b';' => self.take_separator(),
                _ => {
                    if let Some(ch) = self.src[self.pos..].chars().next() {
                        self.pending.push(ch);
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }

        self.flush_operand();
        if !self.opens.is_empty() {
            return Err(self.err("unmatched opening parenthesis"));
        }
        Ok(self.out)
    }

    /// Consume `+`/`-` as part of a number in scientific notation
    /// (pending looks like `1.5e`).
    fn take_scientific_sign(&mut self) -> bool {
        let b = self.byte();
        if b != b'+' && b != b'-' {
            return false;
        }
        let bytes = self.pending.as_bytes();
        if bytes.len() < 2 || !(bytes[bytes.len() - 1] | 0x20 == b'e') || !bytes[0].is_ascii_digit()
        {
            return false;
        }
        let mut dot_seen = false;
        for &ch in &bytes[1..bytes.len() - 1] {
            match ch {
                b'0'..=b'9' => {}
                b'.' if !dot_seen => dot_seen = true,
                _ => return false,
            }
        }
        self.pending.push(b as char);
        self.pos += 1;
        true
    }

    fn take_string(&mut self) -> Result<(), TokenizerError> {
        self.flush_operand();
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::from('"');
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                self.pos = start;
                return Err(self.err("unterminated string literal"));
            };
            self.pos += ch.len_utf8();
            if ch == '"' {
                // doubled quote is an escape
                if self.src[self.pos..].starts_with('"') {
                    text.push('"');
                    text.push('"');
                    self.pos += 1;
                } else {
                    text.push('"');
                    self.out.push(Token::operand(text));
                    return Ok(());
                }
            } else {
                text.push(ch);
            }
        }
    }

    /// A single-quoted sheet name (`'My Sheet'!A1`) accumulates into the
    /// pending reference text, quotes included.
    fn take_quoted_sheet(&mut self) -> Result<(), TokenizerError> {
        let start = self.pos;
        self.pos += 1;
        self.pending.push('\'');
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                self.pos = start;
                return Err(self.err("unterminated quoted sheet name"));
            };
            self.pos += ch.len_utf8();
            self.pending.push(ch);
            if ch == '\'' {
                if self.src[self.pos..].starts_with('\'') {
                    self.pos += 1; // '' escape inside the name
                } else {
                    return Ok(());
                }
            }
        }
    }

    fn take_error_literal(&mut self) -> Result<(), TokenizerError> {
        self.flush_operand();
        for &code in ERROR_CODES {
            if self.src[self.pos..].starts_with(code) {
                self.out.push(Token::operand(code.to_string()));
                self.pos += code.len();
                return Ok(());
            }
        }
        Err(self.err("invalid error literal"))
    }

    fn take_whitespace(&mut self) {
        self.flush_operand();
        while self.pos < self.src.len() && matches!(self.byte(), b' ' | b'\n') {
            self.pos += 1;
        }
        self.out
            .push(Token::new(" ", TokenKind::Whitespace, TokenSub::None));
    }

    fn take_operator(&mut self) {
        self.flush_operand();

        for two in ["<=", ">=", "<>"] {
            if self.src[self.pos..].starts_with(two) {
                self.out.push(Token::new(two, TokenKind::OpInfix, TokenSub::None));
                self.pos += 2;
                return;
            }
        }

        let b = self.byte();
        let kind = match b {
            b'%' => TokenKind::OpPostfix,
            b'+' | b'-' => match self.last_significant() {
                Some(prev)
                    if prev.sub == TokenSub::Close
                        || prev.kind == TokenKind::OpPostfix
                        || prev.kind == TokenKind::Operand =>
                {
                    TokenKind::OpInfix
                }
                _ => TokenKind::OpPrefix,
            },
            _ => TokenKind::OpInfix,
        };

        self.out
            .push(Token::new((b as char).to_string(), kind, TokenSub::None));
        self.pos += 1;
    }

    fn take_opener(&mut self) {
        let token = if self.pending.is_empty() {
            Token::new("(", TokenKind::Paren, TokenSub::Open)
        } else {
            let mut name = std::mem::take(&mut self.pending);
            name.push('(');
            Token::new(name, TokenKind::Func, TokenSub::Open)
        };
        self.opens.push(token.kind);
        self.out.push(token);
        self.pos += 1;
    }

    fn take_closer(&mut self) -> Result<(), TokenizerError> {
        self.flush_operand();
        let Some(kind) = self.opens.pop() else {
            return Err(self.err("unexpected closing parenthesis"));
        };
        self.out.push(Token::new(")", kind, TokenSub::Close));
        self.pos += 1;
        Ok(())
    }

    fn take_separator(&mut self) {
        self.flush_operand();
        let b = self.byte();
        let token = if b == b';' {
            Token::new(";", TokenKind::Sep, TokenSub::Row)
        } else if self.opens.last() == Some(&TokenKind::Func) {
            Token::new(",", TokenKind::Sep, TokenSub::Arg)
        } else {
            Token::new(",", TokenKind::OpInfix, TokenSub::None)
        };
        self.out.push(token);
        self.pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenKind, String)> {
        tokenize(formula)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.tvalue))
            .collect()
    }

    #[test]
    fn plain_text_is_a_literal() {
        let tokens = tokenize("hello").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Literal);
        assert_eq!(tokens[0].tvalue, "hello");
    }

    #[test]
    fn simple_arithmetic() {
        assert_eq!(
            kinds("=1+2*3"),
            vec![
                (TokenKind::Operand, "1".into()),
                (TokenKind::OpInfix, "+".into()),
                (TokenKind::Operand, "2".into()),
                (TokenKind::OpInfix, "*".into()),
                (TokenKind::Operand, "3".into()),
            ]
        );
    }

    #[test]
    fn function_call_tokens() {
        let tokens = kinds("=SUM(A1,B2)");
        assert_eq!(tokens[0], (TokenKind::Func, "SUM(".into()));
        assert_eq!(tokens[2], (TokenKind::Sep, ",".into()));
        assert_eq!(tokens[4], (TokenKind::Func, ")".into()));
    }

    #[test]
    fn leading_minus_is_prefix() {
        let tokens = tokenize("=-A1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::OpPrefix);

        let tokens = tokenize("=2-A1").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::OpInfix);

        // after a closing paren, minus is infix
        let tokens = tokenize("=(1)-2").unwrap();
        let minus = tokens.iter().find(|t| t.tvalue == "-").unwrap();
        assert_eq!(minus.kind, TokenKind::OpInfix);
    }

    #[test]
    fn percent_is_postfix() {
        let tokens = tokenize("=50%").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::OpPostfix);
    }

    #[test]
    fn scientific_notation_swallows_sign() {
        let tokens = tokenize("=1.5e-3+2").unwrap();
        assert_eq!(tokens[0].tvalue, "1.5e-3");
        assert_eq!(tokens[0].sub, TokenSub::Number);
        assert_eq!(tokens[1].tvalue, "+");
    }

    #[test]
    fn string_with_escaped_quotes() {
        let tokens = tokenize("=\"he said \"\"hi\"\"\"").unwrap();
        assert_eq!(tokens[0].sub, TokenSub::Text);
        assert_eq!(tokens[0].tvalue, "\"he said \"\"hi\"\"\"");
    }

    #[test]
    fn quoted_sheet_name_stays_in_reference() {
        let tokens = tokenize("='My Sheet'!A1").unwrap();
        assert_eq!(tokens[0].tvalue, "'My Sheet'!A1");
        assert_eq!(tokens[0].sub, TokenSub::Range);
    }

    #[test]
    fn range_reference_is_one_operand() {
        let tokens = tokenize("=SUM(A1:B10)").unwrap();
        assert_eq!(tokens[1].tvalue, "A1:B10");
        assert_eq!(tokens[1].sub, TokenSub::Range);
    }

    #[test]
    fn error_literal() {
        let tokens = tokenize("=#DIV/0!").unwrap();
        assert_eq!(tokens[0].sub, TokenSub::Error);
    }

    #[test]
    fn unmatched_parens_rejected() {
        assert!(tokenize("=(1+2").is_err());
        assert!(tokenize("=1+2)").is_err());
    }

    #[test]
    fn arrays_rejected() {
        assert!(tokenize("={1,2}").is_err());
    }

    #[test]
    fn union_comma_outside_function_is_an_operator() {
        let tokens = tokenize("=(A1,B1)").unwrap();
        let comma = tokens.iter().find(|t| t.tvalue == ",").unwrap();
        assert_eq!(comma.kind, TokenKind::OpInfix);
    }
}
