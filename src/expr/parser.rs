//! Recursive descent expression parser.
//!
//! Precedence, lowest first:
//! ```text
//! sequence   := ternary ((',' | <juxtaposition>) ternary)*
//! ternary    := or ('?' ternary ':' ternary)?
//! or         := and ('||' and)*
//! and        := equality ('&&' equality)*
//! equality   := comparison (('==' | '!=') comparison)*
//! comparison := additive (('<' | '<=' | '>' | '>=') additive)*
//! additive   := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '%') unary)*
//! unary      := ('-' | '!') unary | postfix
//! postfix    := primary ('.' ident)*
//! primary    := number | percent | string | color | path | call | '(' ternary ')'
//! ```
//!
//! Strings bound to text properties are parsed in interpolation mode by
//! [`parse_interpolated`]: literal text with `{expr}` segments.

use crate::error::LayoutError;
use crate::types::{Color, Value};

use super::ast::{BinaryOp, Expr, Segment, UnaryOp};
use super::tokenizer::{tokenize, Spanned, Token};

/// Deepest nesting of parentheses, ternaries, calls and unary operators.
const MAX_DEPTH: usize = 64;

/// Parse a plain expression.
pub fn parse_expression(input: &str) -> Result<Expr, LayoutError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        source: input,
        tokens,
        cursor: 0,
        depth: 0,
    };
    parser.parse_sequence()
}

/// Parse literal text with embedded `{expr}` segments. `{{` and `}}` escape
/// braces.
pub fn parse_interpolated(input: &str) -> Result<Expr, LayoutError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                text.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let start = i + 1;
                let end = closing_brace(input, start).ok_or_else(|| LayoutError::Parse {
                    expression: input.to_owned(),
                    position: i,
                    message: "unterminated '{'".into(),
                })?;
                let inner = parse_expression(&input[start..end]).map_err(|err| match err {
                    LayoutError::Parse { position, message, .. } => LayoutError::Parse {
                        expression: input.to_owned(),
                        position: start + position,
                        message,
                    },
                    other => other,
                })?;
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Expr(inner));
                while chars.peek().is_some_and(|(j, _)| *j <= end) {
                    chars.next();
                }
            }
            '}' => {
                return Err(LayoutError::Parse {
                    expression: input.to_owned(),
                    position: i,
                    message: "unmatched '}'".into(),
                })
            }
            c => text.push(c),
        }
    }

    if segments.is_empty() {
        return Ok(Expr::Literal(Value::String(text)));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(Expr::Interpolation(segments))
}

/// Byte index of the `}` closing a segment that starts at `start`, skipping
/// quoted strings.
fn closing_brace(input: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in input[start..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '}') => return Some(start + offset),
            _ => {}
        }
    }
    None
}

/// Recursive descent parser state.
struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl Parser<'_> {
    fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|t| &t.token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Spanned, LayoutError> {
        match self.peek() {
            Some(tok) if &tok.token == expected => {
                let tok = tok.clone();
                self.cursor += 1;
                Ok(tok)
            }
            Some(tok) => {
                let message = format!("expected {what}, got '{}'", tok.text);
                Err(self.error(message))
            }
            None => Err(self.error(format!("expected {what}, got end of expression"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> LayoutError {
        LayoutError::Parse {
            expression: self.source.to_owned(),
            position: self.peek().map_or(self.source.len(), |t| t.start),
            message: message.into(),
        }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, LayoutError>) -> Result<T, LayoutError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("expression nests deeper than {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Whether the current token starts right where the previous one ended.
    fn is_adjacent(&self) -> bool {
        match (self.cursor.checked_sub(1).and_then(|i| self.tokens.get(i)), self.peek()) {
            (Some(prev), Some(cur)) => prev.end == cur.start,
            _ => false,
        }
    }

    // ── Grammar ──────────────────────────────────────────────────────

    fn parse_sequence(&mut self) -> Result<Expr, LayoutError> {
        if self.is_eof() {
            return Err(self.error("empty expression"));
        }
        let mut items = vec![self.parse_ternary()?];
        while let Some(token) = self.peek_token() {
            if *token == Token::Comma {
                self.cursor += 1;
                items.push(self.parse_ternary()?);
            } else if starts_operand(token) {
                items.push(self.parse_ternary()?);
            } else {
                let text = self.peek().map(|t| t.text.clone()).unwrap_or_default();
                return Err(self.error(format!("unexpected '{text}'")));
            }
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Expr::List(items))
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, LayoutError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, LayoutError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_ternary()?;
        self.expect(&Token::Colon, "':'")?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.cursor += 1;
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.cursor += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, LayoutError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Modulo) => BinaryOp::Mod,
                _ => break,
            };
            self.cursor += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, LayoutError> {
        let op = match self.peek_token() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.cursor += 1;
        let expr = self.nested(Self::parse_unary)?;
        // Fold negative literals so `-20` stays a constant.
        if let (UnaryOp::Neg, Expr::Literal(Value::Number(n))) = (op, &expr) {
            return Ok(Expr::Literal(Value::Number(-n)));
        }
        Ok(Expr::Unary { op, expr: Box::new(expr) })
    }

    fn parse_postfix(&mut self) -> Result<Expr, LayoutError> {
        let mut expr = self.parse_primary()?;
        while self.peek_token() == Some(&Token::Dot) && self.peek_nth(1) == Some(&Token::Ident) {
            self.cursor += 1;
            let name = self.advance().map(|t| t.text).unwrap_or_default();
            expr = Expr::Member { target: Box::new(expr), name };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, LayoutError> {
        let Some(tok) = self.advance() else {
            return Err(self.error("unexpected end of expression"));
        };
        match tok.token {
            Token::Number => tok
                .text
                .parse::<f64>()
                .map(|n| Expr::Literal(Value::Number(n)))
                .map_err(|_| self.error_at(&tok, "invalid number")),
            Token::Percent => tok
                .text
                .trim_end_matches('%')
                .parse::<f64>()
                .map(Expr::Percent)
                .map_err(|_| self.error_at(&tok, "invalid percentage")),
            Token::StringLiteral | Token::StringLiteralSingle => {
                let inner = &tok.text[1..tok.text.len() - 1];
                Ok(Expr::Literal(Value::String(inner.to_owned())))
            }
            Token::HexColor => Color::from_hex(&tok.text)
                .map(|c| Expr::Literal(Value::Color(c)))
                .ok_or_else(|| self.error_at(&tok, format!("invalid color '{}'", tok.text))),
            Token::Ident => self.parse_path(tok.text),
            Token::ParenOpen => {
                let inner = self.parse_ternary()?;
                self.expect(&Token::ParenClose, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error_at(&tok, format!("unexpected '{}'", tok.text))),
        }
    }

    /// A dotted symbol path, keyword literal, or function call.
    fn parse_path(&mut self, first: String) -> Result<Expr, LayoutError> {
        let mut path = first;
        while self.peek_token() == Some(&Token::Dot) && self.peek_nth(1) == Some(&Token::Ident) {
            self.cursor += 1;
            if let Some(segment) = self.advance() {
                path.push('.');
                path.push_str(&segment.text);
            }
        }

        if self.peek_token() == Some(&Token::ParenOpen) && self.is_adjacent() {
            self.cursor += 1;
            let mut args = Vec::new();
            if !self.eat(&Token::ParenClose) {
                loop {
                    args.push(self.parse_ternary()?);
                    if self.eat(&Token::Comma) {
                        continue;
                    }
                    self.expect(&Token::ParenClose, "')'")?;
                    break;
                }
            }
            return Ok(Expr::Call { name: path, args });
        }

        Ok(match path.as_str() {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "nil" => Expr::Literal(Value::Nil),
            _ => Expr::Symbol(path),
        })
    }

    fn error_at(&self, tok: &Spanned, message: impl Into<String>) -> LayoutError {
        LayoutError::Parse {
            expression: self.source.to_owned(),
            position: tok.start,
            message: message.into(),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
}

/// Tokens that can begin a juxtaposed list item.
fn starts_operand(token: &Token) -> bool {
    matches!(
        token,
        Token::Ident
            | Token::Number
            | Token::Percent
            | Token::StringLiteral
            | Token::StringLiteralSingle
            | Token::HexColor
            | Token::ParenOpen
            | Token::Bang
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Expr {
        Expr::Literal(Value::Number(n))
    }

    fn sym(s: &str) -> Expr {
        Expr::Symbol(s.into())
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse_expression("parent.width - 2 * 10").unwrap(),
            binary(BinaryOp::Sub, sym("parent.width"), binary(BinaryOp::Mul, num(2.0), num(10.0)))
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parse_expression("(a + b) / 2").unwrap(),
            binary(BinaryOp::Div, binary(BinaryOp::Add, sym("a"), sym("b")), num(2.0))
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse_expression("a ? 1 : b ? 2 : 3").unwrap();
        match expr {
            Expr::Ternary { otherwise, .. } => assert!(matches!(*otherwise, Expr::Ternary { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn negative_literal_folds() {
        assert_eq!(parse_expression("-20").unwrap(), num(-20.0));
        assert_eq!(
            parse_expression("-width").unwrap(),
            Expr::Unary { op: UnaryOp::Neg, expr: Box::new(sym("width")) }
        );
    }

    #[test]
    fn calls_require_adjacent_paren() {
        assert_eq!(
            parse_expression("max(a, 10)").unwrap(),
            Expr::Call { name: "max".into(), args: vec![sym("a"), num(10.0)] }
        );
        // Separated by whitespace it is a two-item list.
        assert_eq!(
            parse_expression("bold (17)").unwrap(),
            Expr::List(vec![sym("bold"), num(17.0)])
        );
    }

    #[test]
    fn juxtaposed_font_parts() {
        assert_eq!(
            parse_expression("'Helvetica' bold 17").unwrap(),
            Expr::List(vec![
                Expr::Literal(Value::String("Helvetica".into())),
                sym("bold"),
                num(17.0),
            ])
        );
    }

    #[test]
    fn comma_list() {
        assert_eq!(
            parse_expression("flexibleWidth, flexibleHeight").unwrap(),
            Expr::List(vec![sym("flexibleWidth"), sym("flexibleHeight")])
        );
    }

    #[test]
    fn keywords_and_literals() {
        assert_eq!(parse_expression("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse_expression("nil").unwrap(), Expr::Literal(Value::Nil));
        assert_eq!(parse_expression("50%").unwrap(), Expr::Percent(50.0));
        assert_eq!(
            parse_expression("#f00").unwrap(),
            Expr::Literal(Value::Color(Color::new(1.0, 0.0, 0.0, 1.0)))
        );
    }

    #[test]
    fn member_on_call_result() {
        assert_eq!(
            parse_expression("max(a, b).count").unwrap(),
            Expr::Member {
                target: Box::new(Expr::Call { name: "max".into(), args: vec![sym("a"), sym("b")] }),
                name: "count".into(),
            }
        );
    }

    #[test]
    fn moderate_nesting_parses() {
        let source = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse_expression(&source).unwrap(), num(1.0));
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let nots = format!("{}true", "!".repeat(50_000));
        for source in [parens, nots] {
            match parse_expression(&source).unwrap_err() {
                LayoutError::Parse { message, .. } => assert!(message.contains("nests deeper"), "got {message}"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn errors_carry_position() {
        match parse_expression("a + ").unwrap_err() {
            LayoutError::Parse { position, expression, .. } => {
                assert_eq!(position, 4);
                assert_eq!(expression, "a + ");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_expression("").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("a ? b").is_err());
        assert!(parse_expression("a )").is_err());
    }

    #[test]
    fn interpolation_segments() {
        assert_eq!(
            parse_interpolated("Hello {name}!").unwrap(),
            Expr::Interpolation(vec![
                Segment::Text("Hello ".into()),
                Segment::Expr(sym("name")),
                Segment::Text("!".into()),
            ])
        );
    }

    #[test]
    fn interpolation_plain_text_is_literal() {
        assert_eq!(
            parse_interpolated("Sign in").unwrap(),
            Expr::Literal(Value::String("Sign in".into()))
        );
        assert_eq!(parse_interpolated("").unwrap(), Expr::Literal(Value::String(String::new())));
    }

    #[test]
    fn interpolation_escapes_and_quotes() {
        assert_eq!(
            parse_interpolated("{{x}}").unwrap(),
            Expr::Literal(Value::String("{x}".into()))
        );
        assert_eq!(
            parse_interpolated("{'}'}").unwrap(),
            Expr::Interpolation(vec![Segment::Expr(Expr::Literal(Value::String("}".into())))])
        );
    }

    #[test]
    fn interpolation_errors_point_into_source() {
        match parse_interpolated("ab {1 +}").unwrap_err() {
            LayoutError::Parse { position, expression, .. } => {
                assert_eq!(expression, "ab {1 +}");
                assert_eq!(position, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_interpolated("ab {1").is_err());
        assert!(parse_interpolated("ab }").is_err());
    }
}
