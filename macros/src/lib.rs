//! Proc macros for relayout: the `template!` authoring macro.
//!
//! This crate is not meant to be used directly; enable the `macros` feature on `relayout`.

use proc_macro::TokenStream;

mod template_macro;

/// XML-style template authoring macro.
///
/// Transforms element syntax into `relayout::template::Template` builder calls.
///
/// # Syntax
///
/// - `<Class />`: element without children
/// - `<Class attr="val"> ... </Class>`: element with children
/// - a string literal among the children becomes the body text
///
/// # Attributes
///
/// - `id="value"` becomes `.with_id("value")`
/// - `param:name="Type"` becomes `.with_parameter("name", "Type")`
/// - `macro:name="expr"` becomes `.with_macro("name", "expr")`
/// - everything else, dotted names and `template="path"` included, becomes
///   `.with_expression("name", "value")`
///
/// # Example
///
/// ```ignore
/// let screen = template! {
///     <View id="screen" width="100%" height="100%">
///         <Label id="title" left="10" width="parent.width - 20" layer.cornerRadius="4" />
///         <View template="card.xml" top="title.bottom + 8" />
///     </View>
/// };
/// ```
#[proc_macro]
pub fn template(input: TokenStream) -> TokenStream {
    template_macro::template_impl(input.into())
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
