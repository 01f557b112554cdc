//! Immutable template: the parsed description of one element and its children.
//!
//! Templates are produced by a markup parser (outside this crate) or built in
//! code with the builder methods and the `template!` macro. They are `Send`
//! so they can be resolved on async tasks.

use std::collections::BTreeMap;

use crate::error::LayoutError;
use crate::types::registry::is_subclass;

/// Expression key naming an external template resource.
pub const TEMPLATE_KEY: &str = "template";

/// Expression key holding the stable id.
pub const ID_KEY: &str = "id";

/// Where a template came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// The file or URL originally requested.
    pub origin: Option<String>,
    /// Where the template content was actually read from.
    pub template_path: Option<String>,
    /// Path relative to the project root, for display.
    pub relative_path: Option<String>,
    /// The resource that roots this part of a composed layout.
    pub root_resource: Option<String>,
}

impl SourceLocation {
    /// A location read from `path`.
    pub fn at(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            origin: Some(path.clone()),
            template_path: Some(path),
            ..Self::default()
        }
    }

    /// The resource name used in diagnostics: the root resource, else the
    /// template path, else the origin.
    pub fn resource(&self) -> Option<&str> {
        self.root_resource
            .as_deref()
            .or(self.template_path.as_deref())
            .or(self.origin.as_deref())
    }
}

/// Immutable description of one view and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub class: String,
    pub id: Option<String>,
    /// Property name to expression text.
    pub expressions: BTreeMap<String, String>,
    /// Parameter name to declared type name.
    pub parameters: BTreeMap<String, String>,
    /// Macro name to expansion text.
    pub macros: BTreeMap<String, String>,
    pub children: Vec<Template>,
    pub body: Option<String>,
    pub source: Option<SourceLocation>,
    /// Where children of a referencing node are inserted when this template
    /// is used as a base.
    pub child_insertion_index: Option<usize>,
}

impl Template {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: None,
            expressions: BTreeMap::new(),
            parameters: BTreeMap::new(),
            macros: BTreeMap::new(),
            children: Vec::new(),
            body: None,
            source: None,
            child_insertion_index: None,
        }
    }

    /// Set the stable id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Bind an expression (builder). The `id` key sets the stable id.
    pub fn with_expression(mut self, key: impl Into<String>, expression: impl Into<String>) -> Self {
        let key = key.into();
        if key == ID_KEY {
            self.id = Some(expression.into());
        } else {
            self.expressions.insert(key, expression.into());
        }
        self
    }

    /// Declare a parameter of a named type (builder).
    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), type_name.into());
        self
    }

    /// Declare a macro (builder).
    pub fn with_macro(mut self, name: impl Into<String>, expansion: impl Into<String>) -> Self {
        self.macros.insert(name.into(), expansion.into());
        self
    }

    /// Append a child (builder).
    pub fn with_child(mut self, child: Template) -> Self {
        self.children.push(child);
        self
    }

    /// Set the inline body text (builder).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the source location (builder).
    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    /// Mark where referencing children go when this template is a base
    /// (builder).
    pub fn with_child_insertion(mut self, index: usize) -> Self {
        self.child_insertion_index = Some(index);
        self
    }

    /// The external template this element refers to, if any.
    pub fn template_path(&self) -> Option<&str> {
        self.expressions.get(TEMPLATE_KEY).map(String::as_str)
    }

    /// Whether the two templates describe the same element, ignoring
    /// children.
    pub fn same_attributes(&self, other: &Template) -> bool {
        self.class == other.class
            && self.id == other.id
            && self.expressions == other.expressions
            && self.parameters == other.parameters
            && self.macros == other.macros
            && self.body == other.body
    }

    /// This template without its children.
    pub fn shallow(&self) -> Template {
        Template {
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Compose this referencing element with the `base` template it names.
    ///
    /// The more derived of the two classes wins; unrelated classes are an
    /// error. Our expressions, parameters and macros override the base's,
    /// our children are inserted at the base's insertion index (or
    /// appended), and the base's location becomes the root resource.
    pub fn merged_into(&self, base: &Template) -> Result<Template, LayoutError> {
        let class = if is_subclass(&self.class, &base.class) {
            self.class.clone()
        } else if is_subclass(&base.class, &self.class) {
            base.class.clone()
        } else {
            return Err(LayoutError::invalid(format!(
                "{} is not compatible with template class {}",
                self.class, base.class
            )));
        };

        let mut expressions = base.expressions.clone();
        expressions.extend(self.expressions.clone());
        expressions.remove(TEMPLATE_KEY);

        let mut parameters = base.parameters.clone();
        parameters.extend(self.parameters.clone());
        let mut macros = base.macros.clone();
        macros.extend(self.macros.clone());

        let mut children = base.children.clone();
        let at = base
            .child_insertion_index
            .unwrap_or(children.len())
            .min(children.len());
        children.splice(at..at, self.children.iter().cloned());

        let source = match &base.source {
            Some(location) => {
                let mut location = location.clone();
                location.root_resource = location.resource().map(str::to_owned);
                Some(location)
            }
            None => self.source.clone(),
        };

        Ok(Template {
            class,
            id: self.id.clone().or_else(|| base.id.clone()),
            expressions,
            parameters,
            macros,
            children,
            body: self.body.clone().or_else(|| base.body.clone()),
            source,
            child_insertion_index: None,
        })
    }
}
