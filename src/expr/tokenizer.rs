//! logos-based expression tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `50%` as Percent beats `50` + `%`)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Our ordering ensures:
//! - `#ff00aa` matches [`Token::HexColor`]
//! - `50%` matches [`Token::Percent`], while `10 % 3` is Number, Modulo, Number
//! - `<=`, `==`, `&&` match as single operators

use logos::Logos;

use crate::error::LayoutError;

/// Expression token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // ── Literals ─────────────────────────────────────────────────────

    /// Hex color: `#fff`, `#ff00aa`, `#ff00aa80`.
    #[regex(r"#[0-9a-fA-F]{3,8}")]
    HexColor,

    /// Percentage: `50%`, `12.5%`.
    #[regex(r"[0-9]+(\.[0-9]+)?%")]
    Percent,

    /// Number: integer or float. Signs are unary operators.
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    /// Double-quoted string literal.
    #[regex(r#""[^"]*""#)]
    StringLiteral,

    /// Single-quoted string literal.
    #[regex(r"'[^']*'")]
    StringLiteralSingle,

    /// Identifier: symbol path segments, function names, `true`/`false`/`nil`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Two-character operators ──────────────────────────────────────

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // ── Single-character punctuation ─────────────────────────────────

    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Modulo,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

/// A token with its source text and byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Tokenize an expression, failing on the first character that does not lex.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LayoutError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(input).spanned() {
        match result {
            Ok(token) => tokens.push(Spanned {
                token,
                text: input[span.clone()].to_string(),
                start: span.start,
                end: span.end,
            }),
            Err(()) => {
                return Err(LayoutError::Parse {
                    expression: input.to_owned(),
                    position: span.start,
                    message: format!("unexpected character '{}'", &input[span]),
                })
            }
        }
    }
    Ok(tokens)
}
