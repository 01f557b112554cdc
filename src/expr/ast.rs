//! Expression AST.

use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `50%`, resolved against the property being evaluated.
    Percent(f64),
    /// A dotted symbol path as written: `width`, `parent.width`, `Axis.vertical`.
    Symbol(String),
    /// Member access on a computed value: `(a).b`, `max(a, b).c`.
    Member { target: Box<Expr>, name: String },
    Call { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Ternary { cond: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    /// Comma-separated or juxtaposed parts: `'Helvetica' bold 17`.
    List(Vec<Expr>),
    Interpolation(Vec<Segment>),
}

impl Expr {
    /// Every symbol path referenced, in first-use order without duplicates.
    pub fn symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Expr::Symbol(path) => {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
            Expr::Member { target, .. } => target.collect_symbols(out),
            Expr::Call { args, .. } | Expr::List(args) => {
                for arg in args {
                    arg.collect_symbols(out);
                }
            }
            Expr::Unary { expr, .. } => expr.collect_symbols(out),
            Expr::Binary { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::Ternary { cond, then, otherwise } => {
                cond.collect_symbols(out);
                then.collect_symbols(out);
                otherwise.collect_symbols(out);
            }
            Expr::Interpolation(segments) => {
                for segment in segments {
                    if let Segment::Expr(expr) = segment {
                        expr.collect_symbols(out);
                    }
                }
            }
            Expr::Literal(_) | Expr::Percent(_) => {}
        }
    }
}
