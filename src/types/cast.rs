//! Validate and cast values against a destination [`TypeDescriptor`].

use crate::error::LayoutError;

use super::descriptor::{CompositeType, EnumType, ObjectKind, TypeDescriptor};
use super::registry::type_named;
use super::value::{Font, ObjectValue, StructValue, Value};

/// Cast `value` to the domain described by `ty`.
///
/// Fails with [`LayoutError::TypeMismatch`] when no conversion exists, or
/// [`LayoutError::Invalid`] for malformed composite inputs such as a font
/// specifier with an unrecognized part.
pub fn cast(value: Value, ty: &TypeDescriptor) -> Result<Value, LayoutError> {
    match ty {
        TypeDescriptor::Number => match value {
            Value::Number(_) => Ok(value),
            Value::Bool(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
            Value::Enum(e) => Ok(Value::Number(e.raw as f64)),
            other => Err(LayoutError::mismatch(ty, other.kind_name())),
        },
        TypeDescriptor::Bool => match value {
            Value::Bool(_) => Ok(value),
            Value::Number(n) => Ok(Value::Bool(n != 0.0)),
            other => Err(LayoutError::mismatch(ty, other.kind_name())),
        },
        TypeDescriptor::String => match value {
            Value::String(_) => Ok(value),
            Value::Nil => Ok(Value::String(String::new())),
            Value::Number(_) | Value::Bool(_) | Value::Enum(_) => Ok(Value::String(value.to_string())),
            other => Err(LayoutError::mismatch(ty, other.kind_name())),
        },
        TypeDescriptor::Enum(e) => cast_enum(value, e),
        TypeDescriptor::Object(kind) => cast_object(value, kind),
        TypeDescriptor::Composite(c) => cast_composite(value, c),
        TypeDescriptor::Unavailable(reason) => Err(LayoutError::invalid(format!(
            "property is unavailable: {reason}"
        ))),
    }
}

fn cast_enum(value: Value, ty: &EnumType) -> Result<Value, LayoutError> {
    let mismatch = |found: &str| LayoutError::mismatch(&ty.name, found);
    match value {
        Value::Enum(v) if v.type_name == ty.name => Ok(Value::Enum(v)),
        Value::String(s) => {
            if ty.options {
                let mut raw = 0;
                for name in s.split('|').map(str::trim).filter(|n| !n.is_empty()) {
                    raw |= member_raw(ty, name).ok_or_else(|| unknown_member(ty, name))?;
                }
                ty.combine(raw).ok_or_else(|| mismatch("String"))
            } else {
                ty.member(s.trim()).ok_or_else(|| unknown_member(ty, s.trim()))
            }
        }
        Value::Number(n) if n.fract() == 0.0 => {
            let raw = n as i64;
            let found = if ty.options { ty.combine(raw) } else { ty.member_by_raw(raw) };
            found.ok_or_else(|| {
                LayoutError::invalid(format!("{n} is not a valid {} value", ty.name))
            })
        }
        Value::List(items) if ty.options => {
            let mut raw = 0;
            for item in items {
                match cast_enum(item, ty)? {
                    Value::Enum(v) => raw |= v.raw,
                    other => return Err(mismatch(other.kind_name())),
                }
            }
            ty.combine(raw).ok_or_else(|| mismatch("List"))
        }
        other => Err(mismatch(other.kind_name())),
    }
}

fn member_raw(ty: &EnumType, name: &str) -> Option<i64> {
    ty.members.iter().find(|(m, _)| m == name).map(|(_, raw)| *raw)
}

fn unknown_member(ty: &EnumType, name: &str) -> LayoutError {
    let members: Vec<&str> = ty.member_names().collect();
    LayoutError::invalid(format!(
        "'{name}' is not a member of {} (expected one of {})",
        ty.name,
        members.join(", ")
    ))
}

fn cast_object(value: Value, kind: &ObjectKind) -> Result<Value, LayoutError> {
    match (kind, value) {
        (_, Value::Nil) if *kind != ObjectKind::Font => Ok(Value::Nil),
        (ObjectKind::Color, v @ Value::Color(_)) => Ok(v),
        (ObjectKind::Font, Value::Font(f)) => Ok(Value::Font(f)),
        (ObjectKind::Font, v) => coerce_font(std::slice::from_ref(&v)).map(Value::Font),
        (ObjectKind::Image, Value::String(name)) => Ok(Value::Object(ObjectValue {
            kind: "Image".into(),
            handle: name,
        })),
        (kind, Value::Object(o)) if o.kind == kind.name() => Ok(Value::Object(o)),
        (kind, other) => Err(LayoutError::mismatch(kind.name(), other.kind_name())),
    }
}

fn cast_composite(value: Value, ty: &CompositeType) -> Result<Value, LayoutError> {
    match value {
        Value::Struct(s) if s.type_name == ty.name => {
            let mut out = StructValue::new(ty.name.clone());
            for (field, field_ty) in &ty.fields {
                let v = match s.fields.get(field) {
                    Some(v) => cast(v.clone(), field_ty)?,
                    None => field_ty.default_value(),
                };
                out.fields.insert(field.clone(), v);
            }
            Ok(Value::Struct(out))
        }
        Value::Number(n) if ty.fields.iter().all(|(_, t)| *t == TypeDescriptor::Number) => {
            let mut out = StructValue::new(ty.name.clone());
            for (field, _) in &ty.fields {
                out.fields.insert(field.clone(), Value::Number(n));
            }
            Ok(Value::Struct(out))
        }
        other => Err(LayoutError::mismatch(&ty.name, other.kind_name())),
    }
}

fn enum_named(path: &str) -> Option<EnumType> {
    match type_named(path) {
        Some(TypeDescriptor::Enum(e)) => Some((*e).clone()),
        _ => None,
    }
}

/// Assemble a [`Font`] from heterogeneous parts.
///
/// Numbers set the size, `Font.Trait` members add traits, `Font.Weight`
/// members set the weight, strings name a family (or a trait/weight when they
/// spell one), and a font value becomes the base that later parts modify.
pub fn coerce_font(parts: &[Value]) -> Result<Font, LayoutError> {
    let traits = enum_named("Font.Trait");
    let weights = enum_named("Font.Weight");
    let mut font = Font::default();
    apply_font_parts(&mut font, parts, traits.as_ref(), weights.as_ref())?;
    Ok(font)
}

fn apply_font_parts(
    font: &mut Font,
    parts: &[Value],
    traits: Option<&EnumType>,
    weights: Option<&EnumType>,
) -> Result<(), LayoutError> {
    let is_member = |ty: Option<&EnumType>, name: &str| ty.is_some_and(|t| member_raw(t, name).is_some());
    for part in parts {
        match part {
            Value::Number(n) => font.size = *n,
            Value::Font(base) => {
                let extra = std::mem::take(&mut font.traits);
                *font = base.clone();
                for t in &extra {
                    font.add_trait(t);
                }
            }
            Value::Enum(e) if e.type_name == "Font.Trait" => {
                for name in e.name.split('|').filter(|n| !n.is_empty()) {
                    font.add_trait(name);
                }
            }
            Value::Enum(e) if e.type_name == "Font.Weight" => font.weight = Some(e.name.clone()),
            Value::String(s) if is_member(traits, s) => font.add_trait(s),
            Value::String(s) if is_member(weights, s) => font.weight = Some(s.clone()),
            Value::String(s) => font.name = Some(s.clone()),
            Value::List(items) => apply_font_parts(font, items, traits, weights)?,
            other => {
                return Err(LayoutError::invalid(format!(
                    "invalid font specifier '{other}'"
                )))
            }
        }
    }
    Ok(())
}
