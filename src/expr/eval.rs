//! Expression evaluation against a [`Scope`].

use crate::diagnostics::{best_matches, best_member_matches};
use crate::error::{LayoutError, SymbolError, SymbolErrorKind};
use crate::types::registry::{self, type_named};
use crate::types::{Color, ObjectKind, TypeDescriptor, Value};

use super::ast::{BinaryOp, Expr, Segment, UnaryOp};
use super::cache::CompiledExpression;

/// Built-in functions callable from expressions.
pub const FUNCTIONS: &[&str] = &["abs", "ceil", "floor", "max", "min", "rgb", "rgba", "round"];

/// Symbol table for one evaluation.
pub trait Scope {
    /// Resolve a dotted symbol path.
    ///
    /// `Ok(None)` means the path is unknown to this scope; the evaluator then
    /// tries enum members and static `Type.member` lookups before reporting
    /// an unknown symbol. Errors (a failing dependency, a cycle, a bad member
    /// of a known prefix) propagate unchanged.
    fn resolve(&mut self, path: &str) -> Result<Option<Value>, LayoutError>;

    /// Resolve an `n%` literal for the property being evaluated.
    fn percent(&mut self, value: f64) -> Result<Value, LayoutError> {
        Ok(Value::Number(value / 100.0))
    }

    /// Every name this scope can resolve, for suggestions.
    fn candidates(&mut self) -> Vec<String>;
}

/// Evaluate `compiled` in `scope`.
///
/// `expected` is the destination type; it lets bare identifiers name enum
/// members (`center` for a `TextAlignment`) and font parts (`bold`). The
/// result is not cast to `expected`; callers do that with
/// [`cast`](crate::types::cast()).
pub fn evaluate(
    compiled: &CompiledExpression,
    scope: &mut dyn Scope,
    expected: Option<&TypeDescriptor>,
) -> Result<Value, LayoutError> {
    eval(&compiled.expr, scope, expected).map_err(|err| match err {
        LayoutError::Symbol(symbol) => LayoutError::Symbol(symbol.in_expression(&compiled.source)),
        other => other,
    })
}

fn eval(expr: &Expr, scope: &mut dyn Scope, expected: Option<&TypeDescriptor>) -> Result<Value, LayoutError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Percent(n) => scope.percent(*n),
        Expr::Symbol(path) => eval_symbol(path, scope, expected),
        Expr::Member { target, name } => {
            let value = eval(target, scope, None)?;
            value.member(name).ok_or_else(|| {
                SymbolError::new(SymbolErrorKind::UnknownExpression, name.clone()).into()
            })
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, scope, None)?);
            }
            call(name, &values)
        }
        Expr::Unary { op, expr } => {
            let value = eval(expr, scope, None)?;
            match op {
                UnaryOp::Neg => Ok(Value::Number(-number(&value)?)),
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope),
        Expr::Ternary { cond, then, otherwise } => {
            if eval(cond, scope, None)?.is_truthy() {
                eval(then, scope, expected)
            } else {
                eval(otherwise, scope, expected)
            }
        }
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, scope, expected)?);
            }
            Ok(Value::List(values))
        }
        Expr::Interpolation(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Expr(expr) => match eval(expr, scope, None)? {
                        Value::Nil => {}
                        value => out.push_str(&value.to_string()),
                    },
                }
            }
            Ok(Value::String(out))
        }
    }
}

fn eval_symbol(
    path: &str,
    scope: &mut dyn Scope,
    expected: Option<&TypeDescriptor>,
) -> Result<Value, LayoutError> {
    if !path.contains('.') {
        if let Some(member) = expected_member(expected, path) {
            return Ok(member);
        }
    }
    if let Some(value) = scope.resolve(path)? {
        return Ok(value);
    }

    if let Some((type_path, member)) = path.rsplit_once('.') {
        if let Some(TypeDescriptor::Enum(ty)) = type_named(type_path) {
            return ty.member(member).ok_or_else(|| {
                SymbolError::new(SymbolErrorKind::UnknownMember, path)
                    .with_suggestions(limit(best_member_matches(&ty.name, member, ty.member_names())))
                    .into()
            });
        }

        // Member access on a shorter prefix the scope knows: `font.pointSize`.
        let segments: Vec<&str> = path.split('.').collect();
        for split in (1..segments.len()).rev() {
            let prefix = segments[..split].join(".");
            if let Some(mut value) = scope.resolve(&prefix)? {
                for segment in &segments[split..] {
                    value = value.member(segment).ok_or_else(|| {
                        SymbolError::new(SymbolErrorKind::UnknownExpression, path)
                    })?;
                }
                return Ok(value);
            }
        }
    }

    let mut candidates = scope.candidates();
    candidates.extend(registry::named_type_names());
    Err(SymbolError::new(SymbolErrorKind::UnknownExpression, path)
        .with_suggestions(limit(best_matches(path, candidates)))
        .into())
}

/// A bare identifier naming a member of the destination's enum, or a font
/// trait or weight when the destination is a font.
fn expected_member(expected: Option<&TypeDescriptor>, name: &str) -> Option<Value> {
    match expected? {
        TypeDescriptor::Enum(ty) => ty.member(name),
        TypeDescriptor::Object(ObjectKind::Font) => ["Font.Trait", "Font.Weight"]
            .iter()
            .find_map(|path| match type_named(path) {
                Some(TypeDescriptor::Enum(ty)) => ty.member(name),
                _ => None,
            }),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &mut dyn Scope) -> Result<Value, LayoutError> {
    // Short-circuit before evaluating the right operand.
    match op {
        BinaryOp::And => {
            let l = eval(left, scope, None)?;
            if !l.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval(right, scope, None)?.is_truthy()));
        }
        BinaryOp::Or => {
            let l = eval(left, scope, None)?;
            if l.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval(right, scope, None)?.is_truthy()));
        }
        _ => {}
    }

    let l = eval(left, scope, None)?;
    let r = eval(right, scope, None)?;
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!("{l}{r}"))),
            _ => Ok(Value::Number(number(&l)? + number(&r)?)),
        },
        BinaryOp::Sub => Ok(Value::Number(number(&l)? - number(&r)?)),
        BinaryOp::Mul => Ok(Value::Number(number(&l)? * number(&r)?)),
        BinaryOp::Div | BinaryOp::Mod => {
            let divisor = number(&r)?;
            if divisor == 0.0 {
                return Err(LayoutError::invalid("division by zero"));
            }
            let dividend = number(&l)?;
            Ok(Value::Number(if op == BinaryOp::Div {
                dividend / divisor
            } else {
                dividend % divisor
            }))
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt => Ok(Value::Bool(number(&l)? < number(&r)?)),
        BinaryOp::Le => Ok(Value::Bool(number(&l)? <= number(&r)?)),
        BinaryOp::Gt => Ok(Value::Bool(number(&l)? > number(&r)?)),
        BinaryOp::Ge => Ok(Value::Bool(number(&l)? >= number(&r)?)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Equality that lets an enum compare against its member name.
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Enum(e), Value::String(s)) | (Value::String(s), Value::Enum(e)) => e.name == *s,
        (Value::Number(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_)) => {
            l.as_number() == r.as_number()
        }
        _ => l == r,
    }
}

fn number(value: &Value) -> Result<f64, LayoutError> {
    match value {
        Value::Enum(e) => Ok(e.raw as f64),
        other => other
            .as_number()
            .ok_or_else(|| LayoutError::mismatch("Number", other.kind_name())),
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, LayoutError> {
    let numbers = || args.iter().map(number).collect::<Result<Vec<f64>, _>>();
    let arity = |expected: usize| -> Result<(), LayoutError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(LayoutError::invalid(format!(
                "{name}() takes {expected} argument(s), got {}",
                args.len()
            )))
        }
    };

    match name {
        "min" | "max" => {
            let values = numbers()?;
            let folded = if name == "min" {
                values.into_iter().reduce(f64::min)
            } else {
                values.into_iter().reduce(f64::max)
            };
            folded
                .map(Value::Number)
                .ok_or_else(|| LayoutError::invalid(format!("{name}() needs at least one argument")))
        }
        "abs" | "round" | "floor" | "ceil" => {
            arity(1)?;
            let n = number(&args[0])?;
            Ok(Value::Number(match name {
                "abs" => n.abs(),
                "round" => n.round(),
                "floor" => n.floor(),
                _ => n.ceil(),
            }))
        }
        "rgb" | "rgba" => {
            arity(if name == "rgb" { 3 } else { 4 })?;
            let values = numbers()?;
            let alpha = values.get(3).copied().unwrap_or(1.0);
            Ok(Value::Color(Color::new(
                values[0] / 255.0,
                values[1] / 255.0,
                values[2] / 255.0,
                alpha,
            )))
        }
        _ => Err(SymbolError::new(SymbolErrorKind::UnknownExpression, name)
            .with_suggestions(limit(best_matches(name, FUNCTIONS)))
            .into()),
    }
}

fn limit(mut suggestions: Vec<String>) -> Vec<String> {
    suggestions.truncate(registry::config().max_suggestions);
    suggestions
}
