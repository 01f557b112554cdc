//! `template!` macro: parse XML-like element syntax and generate relayout
//! `Template` builder code.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::{Error, Ident, LitStr, Result, Token};

// ---------------------------------------------------------------------------
// AST types
// ---------------------------------------------------------------------------

/// What an attribute declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeKind {
    /// `key="expression"`
    Expression,
    /// `param:name="TypeName"`
    Parameter,
    /// `macro:name="expansion"`
    Macro,
}

/// A parsed attribute. Names may be dotted: `layer.cornerRadius="4"`.
#[derive(Clone)]
pub(crate) struct Attribute {
    pub kind: AttributeKind,
    pub name: String,
    pub value: LitStr,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("value", &self.value.value())
            .finish()
    }
}

/// A parsed element: `<Class attrs... />` or `<Class attrs...> children </Class>`.
#[derive(Clone)]
pub(crate) struct Element {
    pub tag: Ident,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Element>,
    /// A string literal among the children becomes the body text.
    pub body: Option<LitStr>,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag.to_string())
            .field("attrs", &self.attrs)
            .field("children", &self.children)
            .field("body", &self.body.as_ref().map(LitStr::value))
            .finish()
    }
}

/// The macro input: exactly one root element.
#[derive(Debug)]
struct TemplateInput {
    root: Element,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl Parse for TemplateInput {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.is_empty() {
            return Err(input.error("template! requires one root element"));
        }
        let root = parse_element(input)?;
        if !input.is_empty() {
            return Err(input.error("template! takes a single root element; wrap siblings in a View"));
        }
        Ok(TemplateInput { root })
    }
}

/// Parse an attribute name: `width`, `center.x`, `param:count`.
fn parse_attribute_name(input: ParseStream) -> Result<(AttributeKind, String)> {
    let first = Ident::parse_any(input)?;
    if input.peek(Token![:]) {
        input.parse::<Token![:]>()?;
        let kind = match first.to_string().as_str() {
            "param" => AttributeKind::Parameter,
            "macro" => AttributeKind::Macro,
            other => {
                return Err(Error::new(
                    first.span(),
                    format!("unknown attribute prefix `{other}:`, expected `param:` or `macro:`"),
                ))
            }
        };
        let name = Ident::parse_any(input)?;
        return Ok((kind, name.to_string()));
    }

    let mut name = first.to_string();
    while input.peek(Token![.]) {
        input.parse::<Token![.]>()?;
        let segment = Ident::parse_any(input)?;
        name.push('.');
        name.push_str(&segment.to_string());
    }
    Ok((AttributeKind::Expression, name))
}

/// Parse a single element from the token stream.
pub(crate) fn parse_element(input: ParseStream) -> Result<Element> {
    input.parse::<Token![<]>()?;
    let tag: Ident = input.parse()?;

    let mut attrs = Vec::new();
    loop {
        if input.peek(Token![/]) {
            input.parse::<Token![/]>()?;
            input.parse::<Token![>]>()?;
            return Ok(Element {
                tag,
                attrs,
                children: Vec::new(),
                body: None,
            });
        }
        if input.peek(Token![>]) {
            input.parse::<Token![>]>()?;
            break;
        }

        let (kind, name) = parse_attribute_name(input)?;
        input.parse::<Token![=]>()?;
        let value: LitStr = input.parse()?;
        attrs.push(Attribute { kind, name, value });
    }

    let mut children = Vec::new();
    let mut body = None;
    loop {
        if input.peek(Token![<]) && input.peek2(Token![/]) {
            input.parse::<Token![<]>()?;
            input.parse::<Token![/]>()?;
            let closing_tag: Ident = input.parse()?;
            if closing_tag != tag {
                return Err(Error::new(
                    closing_tag.span(),
                    format!("mismatched closing tag: expected `</{tag}>`, found `</{closing_tag}>`"),
                ));
            }
            input.parse::<Token![>]>()?;
            break;
        }

        if input.peek(Token![<]) {
            children.push(parse_element(input)?);
        } else if input.peek(LitStr) {
            let text: LitStr = input.parse()?;
            if body.is_some() {
                return Err(Error::new(text.span(), "an element takes at most one body string"));
            }
            body = Some(text);
        } else {
            return Err(input.error("expected `<` to start a child element, a body string, or `</` to close the parent"));
        }
    }

    Ok(Element {
        tag,
        attrs,
        children,
        body,
    })
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// Generate the builder chain for one element.
fn generate_element(elem: &Element) -> TokenStream {
    let class = elem.tag.to_string();
    let mut builder_calls = Vec::new();

    for attr in &elem.attrs {
        let name = &attr.name;
        let val = &attr.value;
        let call = match (attr.kind, name.as_str()) {
            (AttributeKind::Expression, "id") => quote! { .with_id(#val) },
            (AttributeKind::Expression, _) => quote! { .with_expression(#name, #val) },
            (AttributeKind::Parameter, _) => quote! { .with_parameter(#name, #val) },
            (AttributeKind::Macro, _) => quote! { .with_macro(#name, #val) },
        };
        builder_calls.push(call);
    }

    if let Some(body) = &elem.body {
        builder_calls.push(quote! { .with_body(#body) });
    }

    for child in &elem.children {
        let child_code = generate_element(child);
        builder_calls.push(quote! { .with_child(#child_code) });
    }

    quote! {
        ::relayout::template::Template::new(#class) #(#builder_calls)*
    }
}

/// Entry point: generate code for the whole template! invocation.
pub(crate) fn template_impl(input: TokenStream) -> Result<TokenStream> {
    let parsed: TemplateInput = syn::parse2(input)?;
    Ok(generate_element(&parsed.root))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    fn parse_single_element(tokens: TokenStream) -> Result<Element> {
        syn::parse2::<TemplateInput>(tokens).map(|t| t.root)
    }

    // -----------------------------------------------------------------------
    // Parsing tests
    // -----------------------------------------------------------------------

    #[test]
    fn parse_self_closing_element() {
        let elem = parse_single_element(quote! { <Label id="title" text="Hi" /> }).unwrap();
        assert_eq!(elem.tag.to_string(), "Label");
        assert!(elem.children.is_empty());
        assert_eq!(elem.attrs.len(), 2);
        assert_eq!(elem.attrs[1].name, "text");
        assert_eq!(elem.attrs[1].value.value(), "Hi");
    }

    #[test]
    fn parse_dotted_and_keyword_names() {
        let elem = parse_single_element(quote! {
            <View layer.cornerRadius="4" center.x="parent.width / 2" type="card" />
        })
        .unwrap();
        let names: Vec<_> = elem.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["layer.cornerRadius", "center.x", "type"]);
    }

    #[test]
    fn parse_parameters_and_macros() {
        let elem = parse_single_element(quote! {
            <View param:count="Number" macro:gap="8" />
        })
        .unwrap();
        assert_eq!(elem.attrs[0].kind, AttributeKind::Parameter);
        assert_eq!(elem.attrs[0].name, "count");
        assert_eq!(elem.attrs[1].kind, AttributeKind::Macro);
        assert_eq!(elem.attrs[1].name, "gap");
    }

    #[test]
    fn parse_unknown_prefix_is_error() {
        let err = parse_single_element(quote! { <View style:color="red" /> }).unwrap_err();
        assert!(err.to_string().contains("unknown attribute prefix"));
    }

    #[test]
    fn parse_nested_children_and_body() {
        let elem = parse_single_element(quote! {
            <View>
                <Label>"Hello"</Label>
                <View>
                    <Button id="go" />
                </View>
            </View>
        })
        .unwrap();
        assert_eq!(elem.children.len(), 2);
        assert_eq!(elem.children[0].body.as_ref().map(LitStr::value).as_deref(), Some("Hello"));
        assert_eq!(elem.children[1].children[0].tag.to_string(), "Button");
    }

    #[test]
    fn parse_error_mismatched_closing_tag() {
        let err = parse_single_element(quote! {
            <View>
                <Label />
            </Button>
        })
        .unwrap_err();
        assert!(err.to_string().contains("mismatched closing tag"));
    }

    #[test]
    fn parse_error_multiple_roots() {
        let err = parse_single_element(quote! { <View /> <Label /> }).unwrap_err();
        assert!(err.to_string().contains("single root element"));
    }

    #[test]
    fn parse_error_empty_input() {
        let err = template_impl(quote! {}).unwrap_err();
        assert!(err.to_string().contains("requires one root element"));
    }

    // -----------------------------------------------------------------------
    // Code generation tests
    // -----------------------------------------------------------------------

    #[test]
    fn codegen_id_and_expressions() {
        let code = template_impl(quote! { <Label id="title" width="parent.width - 20" /> })
            .unwrap()
            .to_string();
        assert!(code.contains("Template :: new (\"Label\")"), "got {code}");
        assert!(code.contains("with_id (\"title\")"), "got {code}");
        assert!(code.contains("with_expression (\"width\" , \"parent.width - 20\")"), "got {code}");
    }

    #[test]
    fn codegen_template_reference_is_an_expression() {
        let code = template_impl(quote! { <View template="card.xml" /> }).unwrap().to_string();
        assert!(code.contains("with_expression (\"template\" , \"card.xml\")"), "got {code}");
    }

    #[test]
    fn codegen_children_and_declarations() {
        let code = template_impl(quote! {
            <View param:count="Number" macro:gap="8">
                <Label>"Body"</Label>
            </View>
        })
        .unwrap()
        .to_string();
        assert!(code.contains("with_parameter (\"count\" , \"Number\")"), "got {code}");
        assert!(code.contains("with_macro (\"gap\" , \"8\")"), "got {code}");
        assert!(code.contains("with_body (\"Body\")"), "got {code}");
        assert!(code.contains("with_child"), "got {code}");
    }
}
