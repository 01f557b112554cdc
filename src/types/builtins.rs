//! Built-in view classes and named types.
//!
//! The set of view kinds is closed: each one is declared here by an explicit
//! [`ClassBuilder`] call. Embedders add their own kinds with
//! [`register_class`](super::registry::register_class).

use crate::config::EngineConfig;

use super::descriptor::{CompositeType, EnumType, ObjectKind, TypeDescriptor};
use super::registry::ClassBuilder;
use super::value::Value;

/// Layout properties every view has. These are evaluated by the node tree's
/// geometry rules rather than read from the host view.
pub const GEOMETRY_PROPERTIES: &[&str] = &[
    "left", "top", "right", "bottom", "width", "height", "center.x", "center.y",
];

pub(crate) fn insets_type() -> TypeDescriptor {
    TypeDescriptor::composite(CompositeType::new(
        "Insets",
        vec![
            ("top", TypeDescriptor::Number),
            ("left", TypeDescriptor::Number),
            ("bottom", TypeDescriptor::Number),
            ("right", TypeDescriptor::Number),
        ],
    ))
}

pub(crate) fn size_type() -> TypeDescriptor {
    TypeDescriptor::composite(CompositeType::new(
        "Size",
        vec![("width", TypeDescriptor::Number), ("height", TypeDescriptor::Number)],
    ))
}

pub(crate) fn point_type() -> TypeDescriptor {
    TypeDescriptor::composite(CompositeType::new(
        "Point",
        vec![("x", TypeDescriptor::Number), ("y", TypeDescriptor::Number)],
    ))
}

pub(crate) fn font_traits() -> EnumType {
    EnumType::options("Font.Trait", &["bold", "italic", "condensed", "expanded", "monospace"])
}

pub(crate) fn font_weights() -> EnumType {
    EnumType::new(
        "Font.Weight",
        &[
            "ultraLight", "thin", "light", "regular", "medium", "semibold", "heavy", "black",
        ],
    )
}

fn text_alignment() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::new(
        "TextAlignment",
        &["natural", "left", "center", "right", "justified"],
    ))
}

fn content_mode() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::new(
        "ContentMode",
        &[
            "scaleToFill", "scaleAspectFit", "scaleAspectFill", "redraw", "center", "top",
            "bottom", "left", "right",
        ],
    ))
}

fn axis() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::new("Axis", &["horizontal", "vertical"]))
}

fn autoresizing_mask() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::options(
        "AutoresizingMask",
        &[
            "flexibleLeftMargin", "flexibleWidth", "flexibleRightMargin", "flexibleTopMargin",
            "flexibleHeight", "flexibleBottomMargin",
        ],
    ))
}

fn stack_distribution() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::new(
        "StackView.Distribution",
        &["fill", "fillEqually", "fillProportionally", "equalSpacing", "equalCentering"],
    ))
}

fn stack_alignment() -> TypeDescriptor {
    TypeDescriptor::enumeration(EnumType::new(
        "StackView.Alignment",
        &["fill", "leading", "center", "trailing"],
    ))
}

/// Named types resolvable through `type_named` and static member expressions.
pub(crate) fn named_types() -> Vec<(String, TypeDescriptor)> {
    vec![
        ("Insets".into(), insets_type()),
        ("Size".into(), size_type()),
        ("Point".into(), point_type()),
        ("Font.Trait".into(), TypeDescriptor::enumeration(font_traits())),
        ("Font.Weight".into(), TypeDescriptor::enumeration(font_weights())),
        ("TextAlignment".into(), text_alignment()),
        ("ContentMode".into(), content_mode()),
        ("Axis".into(), axis()),
        ("AutoresizingMask".into(), autoresizing_mask()),
        ("StackView".into(), TypeDescriptor::Object(ObjectKind::Named("StackView".into()))),
        ("StackView.Distribution".into(), stack_distribution()),
        ("StackView.Alignment".into(), stack_alignment()),
    ]
}

fn color() -> TypeDescriptor {
    TypeDescriptor::Object(ObjectKind::Color)
}

fn image() -> TypeDescriptor {
    TypeDescriptor::Object(ObjectKind::Image)
}

fn font() -> TypeDescriptor {
    TypeDescriptor::Object(ObjectKind::Font)
}

fn view(config: &EngineConfig) -> ClassBuilder {
    let mut class = ClassBuilder::new("View");
    for name in ["left", "top", "right", "bottom", "width", "height"] {
        class = class.property(name, TypeDescriptor::Number);
    }
    class = class
        .property("center", point_type())
        .property("alpha", TypeDescriptor::Number)
        .default_value("alpha", Value::Number(1.0))
        .property("isHidden", TypeDescriptor::Bool)
        .property("backgroundColor", color())
        .property("tintColor", color())
        .property("contentMode", content_mode())
        .property("clipsToBounds", TypeDescriptor::Bool)
        .property("isUserInteractionEnabled", TypeDescriptor::Bool)
        .default_value("isUserInteractionEnabled", Value::Bool(true))
        .property("tag", TypeDescriptor::Number)
        .property("autoresizingMask", autoresizing_mask())
        .property("layoutMargins", insets_type())
        .property("layer.cornerRadius", TypeDescriptor::Number)
        .property("layer.borderWidth", TypeDescriptor::Number)
        .property("layer.borderColor", color())
        .property("layer.contents", image());
    if config.private_properties {
        class = class
            .property("_debugIdentifier", TypeDescriptor::String)
            .property("layer.allowsEdgeAntialiasing", TypeDescriptor::Bool);
    }
    class
}

fn label() -> ClassBuilder {
    ClassBuilder::new("Label")
        .inherits("View")
        .property("text", TypeDescriptor::String)
        .property("font", font())
        .property("textColor", color())
        .property("textAlignment", text_alignment())
        .property("numberOfLines", TypeDescriptor::Number)
        .default_value("numberOfLines", Value::Number(1.0))
        .mask("layer.contents", "Label draws its own text")
}

fn button() -> ClassBuilder {
    ClassBuilder::new("Button")
        .inherits("View")
        .property("title", TypeDescriptor::String)
        .property("titleColor", color())
        .property("image", image())
        .property("isEnabled", TypeDescriptor::Bool)
        .default_value("isEnabled", Value::Bool(true))
        .property("titleLabel.font", font())
        .property("titleLabel.text", TypeDescriptor::String)
        .property("titleLabel.textColor", color())
        .mask("titleLabel.text", "use title instead")
        .mask("titleLabel.textColor", "use titleColor instead")
}

fn image_view() -> ClassBuilder {
    ClassBuilder::new("ImageView")
        .inherits("View")
        .property("image", image())
        .property("highlightedImage", image())
        .property("isHighlighted", TypeDescriptor::Bool)
        .remove("layer.contents")
}

fn scroll_view() -> ClassBuilder {
    ClassBuilder::new("ScrollView")
        .inherits("View")
        .property("contentInset", insets_type())
        .property("contentSize", size_type())
        .property("contentOffset", point_type())
        .property("isScrollEnabled", TypeDescriptor::Bool)
        .default_value("isScrollEnabled", Value::Bool(true))
        .property("showsVerticalScrollIndicator", TypeDescriptor::Bool)
        .property("showsHorizontalScrollIndicator", TypeDescriptor::Bool)
        .default_value("clipsToBounds", Value::Bool(true))
        .mask("contentOffset", "contentOffset is driven by scrolling")
}

fn stack_view() -> ClassBuilder {
    ClassBuilder::new("StackView")
        .inherits("View")
        .property("axis", axis())
        .property("spacing", TypeDescriptor::Number)
        .property("distribution", stack_distribution())
        .property("alignment", stack_alignment())
}

/// Built-in classes, superclasses first.
pub(crate) fn classes(config: &EngineConfig) -> Vec<ClassBuilder> {
    vec![
        view(config),
        label(),
        button(),
        image_view(),
        scroll_view(),
        stack_view(),
    ]
}
