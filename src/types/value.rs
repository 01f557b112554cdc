//! Runtime values produced by expressions and committed to host views.

use std::collections::BTreeMap;
use std::fmt;

use crate::geometry::{Insets, Point, Rect, Size};

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const CLEAR: Color = Color { red: 0.0, green: 0.0, blue: 0.0, alpha: 0.0 };

    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self { red, green, blue, alpha }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Color> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match digits.len() {
            3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => digits.to_owned(),
            _ => return None,
        };
        let channel = |i: usize| -> Option<f64> {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .ok()
                .map(|v| f64::from(v) / 255.0)
        };
        let alpha = if expanded.len() == 8 { channel(6)? } else { 1.0 };
        Some(Color::new(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    fn to_hex(self) -> String {
        let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mut s = format!("#{:02x}{:02x}{:02x}", byte(self.red), byte(self.green), byte(self.blue));
        if self.alpha < 1.0 {
            s.push_str(&format!("{:02x}", byte(self.alpha)));
        }
        s
    }
}

/// A member of an enum or option-set type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Registered type name, e.g. `TextAlignment`.
    pub type_name: String,
    /// Member name; option sets join their members with `|`.
    pub name: String,
    pub raw: i64,
}

/// A font description assembled from size, weight, traits and an optional
/// family name.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    pub size: f64,
    pub weight: Option<String>,
    /// Sorted, without duplicates.
    pub traits: Vec<String>,
}

impl Font {
    /// The system font size used when an expression names no size.
    pub const DEFAULT_SIZE: f64 = 17.0;

    /// Add a trait, keeping the list sorted and unique.
    pub fn add_trait(&mut self, name: &str) {
        if let Err(pos) = self.traits.binary_search_by(|t| t.as_str().cmp(name)) {
            self.traits.insert(pos, name.to_owned());
        }
    }
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: None,
            size: Font::DEFAULT_SIZE,
            weight: None,
            traits: Vec::new(),
        }
    }
}

/// A value of a composite type such as `Insets` or `Size`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: String,
    pub fields: BTreeMap<String, Value>,
}

impl StructValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), fields: BTreeMap::new() }
    }

    /// Set a field (builder).
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}

/// An opaque object of a declared kind (an image, a host-provided handle).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub kind: String,
    pub handle: String,
}

/// A typed runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Color(Color),
    Enum(EnumValue),
    Font(Font),
    Struct(StructValue),
    Object(ObjectValue),
    List(Vec<Value>),
}

impl Value {
    /// Short name of the value's kind, used in type-mismatch messages.
    pub fn kind_name(&self) -> &str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Color(_) => "Color",
            Value::Enum(e) => &e.type_name,
            Value::Font(_) => "Font",
            Value::Struct(s) => &s.type_name,
            Value::Object(o) => &o.kind,
            Value::List(_) => "List",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness for `!`, `&&`, `||` and `?:`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Member access on composite values: struct fields, font and color
    /// components, list counts.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Struct(s) => s.fields.get(name).cloned(),
            Value::Font(font) => match name {
                "pointSize" | "size" => Some(Value::Number(font.size)),
                "fontName" | "name" => font.name.clone().map(Value::String),
                "weight" => font.weight.clone().map(Value::String),
                _ => None,
            },
            Value::Color(c) => match name {
                "red" => Some(Value::Number(c.red)),
                "green" => Some(Value::Number(c.green)),
                "blue" => Some(Value::Number(c.blue)),
                "alpha" => Some(Value::Number(c.alpha)),
                _ => None,
            },
            Value::Enum(e) if name == "rawValue" => Some(Value::Number(e.raw as f64)),
            Value::String(s) if name == "count" => Some(Value::Number(s.chars().count() as f64)),
            Value::List(items) if name == "count" => Some(Value::Number(items.len() as f64)),
            _ => None,
        }
    }

    /// Build an `Insets` struct value.
    pub fn insets(insets: Insets) -> Value {
        Value::Struct(
            StructValue::new("Insets")
                .with("top", Value::Number(insets.top))
                .with("left", Value::Number(insets.left))
                .with("bottom", Value::Number(insets.bottom))
                .with("right", Value::Number(insets.right)),
        )
    }

    /// Build a `Size` struct value.
    pub fn size(size: Size) -> Value {
        Value::Struct(
            StructValue::new("Size")
                .with("width", Value::Number(size.width))
                .with("height", Value::Number(size.height)),
        )
    }

    /// Build a `Point` struct value.
    pub fn point(point: Point) -> Value {
        Value::Struct(
            StructValue::new("Point")
                .with("x", Value::Number(point.x))
                .with("y", Value::Number(point.y)),
        )
    }

    /// Build a `Rect` struct value.
    pub fn rect(rect: Rect) -> Value {
        Value::Struct(
            StructValue::new("Rect")
                .with("x", Value::Number(rect.x))
                .with("y", Value::Number(rect.y))
                .with("width", Value::Number(rect.width))
                .with("height", Value::Number(rect.height)),
        )
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(f, *n),
            Value::String(s) => write!(f, "{s}"),
            Value::Color(c) => write!(f, "{}", c.to_hex()),
            Value::Enum(e) => write!(f, "{}", e.name),
            Value::Font(font) => {
                let mut parts: Vec<String> = Vec::new();
                if let Some(name) = &font.name {
                    parts.push(format!("'{name}'"));
                }
                parts.extend(font.traits.iter().cloned());
                if let Some(weight) = &font.weight {
                    parts.push(weight.clone());
                }
                parts.push(Value::Number(font.size).to_string());
                write!(f, "{}", parts.join(" "))
            }
            Value::Struct(s) => {
                write!(f, "{}(", s.type_name)?;
                for (i, (name, value)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, ")")
            }
            Value::Object(o) => write!(f, "<{} {}>", o.kind, o.handle),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
