//! Type descriptors: the legal value domain of a bindable property.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::value::{EnumValue, Font, StructValue, Value};

/// Kinds of opaque object a property can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Color,
    Font,
    Image,
    /// Any other host-defined kind.
    Named(String),
}

impl ObjectKind {
    pub fn name(&self) -> &str {
        match self {
            ObjectKind::Color => "Color",
            ObjectKind::Font => "Font",
            ObjectKind::Image => "Image",
            ObjectKind::Named(name) => name,
        }
    }
}

/// An enum or option-set type with a named-value table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    /// Members in declaration order.
    pub members: Vec<(String, i64)>,
    /// Option sets combine members bitwise.
    pub options: bool,
}

impl EnumType {
    /// Create an enum whose members get raw values `0, 1, 2, ...`.
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members
                .iter()
                .enumerate()
                .map(|(i, m)| ((*m).to_owned(), i as i64))
                .collect(),
            options: false,
        }
    }

    /// Create an option set whose members get raw values `1, 2, 4, ...`.
    pub fn options(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members
                .iter()
                .enumerate()
                .map(|(i, m)| ((*m).to_owned(), 1i64 << i))
                .collect(),
            options: true,
        }
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<Value> {
        self.members
            .iter()
            .find(|(m, _)| m == name)
            .map(|(m, raw)| self.value(m, *raw))
    }

    /// Look up a member by raw value.
    pub fn member_by_raw(&self, raw: i64) -> Option<Value> {
        self.members
            .iter()
            .find(|(_, r)| *r == raw)
            .map(|(m, raw)| self.value(m, *raw))
    }

    /// Combine option members by raw bits. Unknown bits yield `None`.
    pub fn combine(&self, raw: i64) -> Option<Value> {
        if !self.options {
            return self.member_by_raw(raw);
        }
        let names: Vec<&str> = self
            .members
            .iter()
            .filter(|(_, bit)| raw & bit != 0)
            .map(|(m, _)| m.as_str())
            .collect();
        let known = self.members.iter().fold(0, |acc, (_, bit)| acc | bit);
        if raw & !known != 0 {
            return None;
        }
        Some(self.value(&names.join("|"), raw))
    }

    /// Member names in declaration order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(m, _)| m.as_str())
    }

    fn value(&self, name: &str, raw: i64) -> Value {
        Value::Enum(EnumValue {
            type_name: self.name.clone(),
            name: name.to_owned(),
            raw,
        })
    }
}

/// A struct-like type with named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub fields: Vec<(String, TypeDescriptor)>,
}

impl CompositeType {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, TypeDescriptor)>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(|(n, t)| (n.to_owned(), t)).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeDescriptor> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// The legal value domain of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Number,
    Bool,
    String,
    Enum(Rc<EnumType>),
    Object(ObjectKind),
    Composite(Rc<CompositeType>),
    /// Explicitly disabled, with a human-readable reason.
    Unavailable(String),
}

impl TypeDescriptor {
    pub fn enumeration(ty: EnumType) -> Self {
        TypeDescriptor::Enum(Rc::new(ty))
    }

    pub fn composite(ty: CompositeType) -> Self {
        TypeDescriptor::Composite(Rc::new(ty))
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, TypeDescriptor::Unavailable(_))
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Number => "Number",
            TypeDescriptor::Bool => "Bool",
            TypeDescriptor::String => "String",
            TypeDescriptor::Enum(e) => &e.name,
            TypeDescriptor::Object(kind) => kind.name(),
            TypeDescriptor::Composite(c) => &c.name,
            TypeDescriptor::Unavailable(_) => "Unavailable",
        }
    }

    /// The value a property takes when neither an expression, the host view
    /// nor the class supplies one.
    pub fn default_value(&self) -> Value {
        match self {
            TypeDescriptor::Number => Value::Number(0.0),
            TypeDescriptor::Bool => Value::Bool(false),
            TypeDescriptor::String => Value::String(String::new()),
            TypeDescriptor::Enum(e) if e.options => e.combine(0).unwrap_or_default(),
            TypeDescriptor::Enum(e) => e
                .members
                .first()
                .and_then(|(_, raw)| e.member_by_raw(*raw))
                .unwrap_or_default(),
            TypeDescriptor::Object(ObjectKind::Font) => Value::Font(Font::default()),
            TypeDescriptor::Object(_) => Value::Nil,
            TypeDescriptor::Composite(c) => {
                let fields: BTreeMap<String, Value> = c
                    .fields
                    .iter()
                    .map(|(n, t)| (n.clone(), t.default_value()))
                    .collect();
                Value::Struct(StructValue { type_name: c.name.clone(), fields })
            }
            TypeDescriptor::Unavailable(_) => Value::Nil,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
