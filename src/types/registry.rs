//! Per-class property tables.
//!
//! Each node class contributes its table through an explicit [`ClassBuilder`]
//! registration. Tables are merged down the superclass chain and memoized per
//! class in a thread-local registry (the UI thread owns all layout state).
//! [`clear`] drops memoized tables without forgetting registrations, so the
//! next query rebuilds an equal but distinct table.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::diagnostics::best_matches;
use crate::error::LayoutError;

use super::builtins;
use super::descriptor::{ObjectKind, TypeDescriptor};
use super::value::Value;

/// Property name -> descriptor, ordered for deterministic diagnostics.
pub type PropertyTable = BTreeMap<String, TypeDescriptor>;

// ---------------------------------------------------------------------------
// ClassBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ClassOp {
    Property(String, TypeDescriptor),
    Default(String, Value),
    Mask(String, String),
    Remove(String),
}

/// Declares a node class: its superclass and an ordered list of property
/// declarations, overrides, masks and removals.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    superclass: Option<String>,
    ops: Vec<ClassOp>,
}

impl ClassBuilder {
    /// Start declaring a root class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            ops: Vec::new(),
        }
    }

    /// Inherit the superclass's table (builder).
    pub fn inherits(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Declare or override a property. Composite types also declare one dotted
    /// key per field, recursively.
    pub fn property(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.ops.push(ClassOp::Property(name.into(), ty));
        self
    }

    /// Set the class default for a property (builder).
    pub fn default_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.ops.push(ClassOp::Default(name.into(), value));
        self
    }

    /// Mark `prefix` and every dotted key under it unavailable, as present at
    /// this point in the declaration.
    pub fn mask(mut self, prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.ops.push(ClassOp::Mask(prefix.into(), reason.into()));
        self
    }

    /// Remove `prefix` and every dotted key under it.
    pub fn remove(mut self, prefix: impl Into<String>) -> Self {
        self.ops.push(ClassOp::Remove(prefix.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// ClassTypes
// ---------------------------------------------------------------------------

/// The merged property table of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTypes {
    pub class: String,
    pub properties: PropertyTable,
    pub defaults: BTreeMap<String, Value>,
}

impl ClassTypes {
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Names of available properties.
    pub fn available_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, t)| t.is_available())
            .map(|(n, _)| n.as_str())
    }

    /// Class default, falling back to the descriptor default.
    pub fn default_for(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.defaults.get(name) {
            return Some(v.clone());
        }
        self.properties.get(name).map(TypeDescriptor::default_value)
    }
}

fn insert_property(table: &mut PropertyTable, name: &str, ty: &TypeDescriptor) {
    table.insert(name.to_owned(), ty.clone());
    if let TypeDescriptor::Composite(composite) = ty {
        for (field, field_ty) in &composite.fields {
            insert_property(table, &format!("{name}.{field}"), field_ty);
        }
    }
}

fn matches_prefix(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key.as_bytes()[prefix.len()] == b'.')
}

// ---------------------------------------------------------------------------
// Registry state
// ---------------------------------------------------------------------------

struct Registry {
    classes: HashMap<String, ClassBuilder>,
    named_types: HashMap<String, TypeDescriptor>,
    tables: HashMap<String, Rc<ClassTypes>>,
    expression_types: HashMap<(String, String), Option<TypeDescriptor>>,
    config: EngineConfig,
}

impl Registry {
    fn new(config: EngineConfig) -> Self {
        let mut registry = Self {
            classes: HashMap::new(),
            named_types: HashMap::new(),
            tables: HashMap::new(),
            expression_types: HashMap::new(),
            config,
        };
        registry.install_builtins();
        registry
    }

    fn install_builtins(&mut self) {
        for (name, ty) in builtins::named_types() {
            self.named_types.insert(name, ty);
        }
        for class in builtins::classes(&self.config) {
            self.classes.insert(class.name.clone(), class);
        }
    }

    fn invalidate(&mut self) {
        self.tables.clear();
        self.expression_types.clear();
    }

    fn build(&mut self, class: &str) -> Result<Rc<ClassTypes>, LayoutError> {
        self.build_chain(class, &mut Vec::new())
    }

    /// `chain` holds the subclasses whose tables wait on this one.
    fn build_chain(&mut self, class: &str, chain: &mut Vec<String>) -> Result<Rc<ClassTypes>, LayoutError> {
        if let Some(table) = self.tables.get(class) {
            return Ok(Rc::clone(table));
        }
        if chain.iter().any(|c| c == class) {
            chain.push(class.to_owned());
            return Err(LayoutError::invalid(format!(
                "cyclic superclass chain: {}",
                chain.join(" -> ")
            )));
        }
        let Some(decl) = self.classes.get(class).cloned() else {
            let mut names: Vec<&String> = self.classes.keys().collect();
            names.sort();
            return Err(LayoutError::UnknownClass {
                class: class.to_owned(),
                suggestions: truncate(best_matches(class, names), self.config.max_suggestions),
            });
        };

        let (mut properties, mut defaults) = match &decl.superclass {
            Some(superclass) => {
                chain.push(class.to_owned());
                let parent = self.build_chain(superclass, chain)?;
                chain.pop();
                (parent.properties.clone(), parent.defaults.clone())
            }
            None => (PropertyTable::new(), BTreeMap::new()),
        };

        for op in &decl.ops {
            match op {
                ClassOp::Property(name, ty) => insert_property(&mut properties, name, ty),
                ClassOp::Default(name, value) => {
                    defaults.insert(name.clone(), value.clone());
                }
                ClassOp::Mask(prefix, reason) => {
                    for (key, ty) in properties.iter_mut() {
                        if matches_prefix(key, prefix) {
                            *ty = TypeDescriptor::Unavailable(reason.clone());
                        }
                    }
                    properties
                        .entry(prefix.clone())
                        .or_insert_with(|| TypeDescriptor::Unavailable(reason.clone()));
                }
                ClassOp::Remove(prefix) => {
                    properties.retain(|key, _| !matches_prefix(key, prefix));
                    defaults.retain(|key, _| !matches_prefix(key, prefix));
                }
            }
        }

        let table = Rc::new(ClassTypes {
            class: class.to_owned(),
            properties,
            defaults,
        });
        self.tables.insert(class.to_owned(), Rc::clone(&table));
        Ok(table)
    }

    fn resolve_named(&self, name: &str) -> Option<TypeDescriptor> {
        if let Some(ty) = self.named_types.get(name) {
            return Some(ty.clone());
        }
        match name {
            "Number" => Some(TypeDescriptor::Number),
            "Bool" => Some(TypeDescriptor::Bool),
            "String" => Some(TypeDescriptor::String),
            "Color" => Some(TypeDescriptor::Object(ObjectKind::Color)),
            "Font" => Some(TypeDescriptor::Object(ObjectKind::Font)),
            "Image" => Some(TypeDescriptor::Object(ObjectKind::Image)),
            _ => None,
        }
    }

    fn type_named(&self, path: &str) -> Option<TypeDescriptor> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current_path = first.to_owned();
        let mut current = self.resolve_named(first)?;
        for segment in segments {
            current_path.push('.');
            current_path.push_str(segment);
            current = match self.named_types.get(&current_path) {
                Some(ty) => ty.clone(),
                None => match &current {
                    TypeDescriptor::Composite(c) => c.field(segment)?.clone(),
                    _ => return None,
                },
            };
        }
        Some(current)
    }
}

fn truncate(mut items: Vec<String>, max: usize) -> Vec<String> {
    items.truncate(max);
    items
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new(EngineConfig::default()));
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The merged property table for `class`, memoized until [`clear`].
pub fn types_for(class: &str) -> Result<Rc<ClassTypes>, LayoutError> {
    REGISTRY.with(|r| r.borrow_mut().build(class))
}

/// Register (or replace) a class declaration.
pub fn register_class(class: ClassBuilder) {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        tracing::debug!(class = %class.name, "registering class");
        r.classes.insert(class.name.clone(), class);
        r.invalidate();
    });
}

/// Register (or replace) a named type such as `TextAlignment` or `Font.Trait`.
pub fn register_type(name: impl Into<String>, ty: TypeDescriptor) {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        r.named_types.insert(name.into(), ty);
        r.invalidate();
    });
}

/// Resolve a dotted type path (`Font.Weight`, `Insets.top`) to a descriptor.
///
/// Every segment must resolve, either to a registered nested type or to a
/// field of the composite resolved so far.
pub fn type_named(path: &str) -> Option<TypeDescriptor> {
    REGISTRY.with(|r| r.borrow().type_named(path))
}

/// Names of all registered named types, sorted.
pub fn named_type_names() -> Vec<String> {
    REGISTRY.with(|r| {
        let mut names: Vec<String> = r.borrow().named_types.keys().cloned().collect();
        names.sort();
        names
    })
}

/// The expected type of an expression bound to `key` on `class`, memoized per
/// class. Unknown keys yield `None`.
pub fn expression_type(class: &str, key: &str) -> Result<Option<TypeDescriptor>, LayoutError> {
    let cache_key = (class.to_owned(), key.to_owned());
    if let Some(hit) = REGISTRY.with(|r| r.borrow().expression_types.get(&cache_key).cloned()) {
        return Ok(hit);
    }
    let table = types_for(class)?;
    let ty = table.get(key).cloned();
    REGISTRY.with(|r| {
        r.borrow_mut().expression_types.insert(cache_key, ty.clone());
    });
    Ok(ty)
}

#[cfg(test)]
pub(crate) fn expression_type_memoized(class: &str, key: &str) -> bool {
    REGISTRY.with(|r| {
        r.borrow()
            .expression_types
            .contains_key(&(class.to_owned(), key.to_owned()))
    })
}

/// The direct superclass of `class`, if registered.
pub fn superclass(class: &str) -> Option<String> {
    REGISTRY.with(|r| r.borrow().classes.get(class).and_then(|c| c.superclass.clone()))
}

/// Whether `class` is `ancestor` or inherits from it.
/// A cyclic chain ends the walk.
pub fn is_subclass(class: &str, ancestor: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(class.to_owned());
    while let Some(name) = current {
        if name == ancestor {
            return true;
        }
        current = superclass(&name);
        if !seen.insert(name) {
            return false;
        }
    }
    false
}

/// Whether a class with this name is registered.
pub fn is_registered(class: &str) -> bool {
    REGISTRY.with(|r| r.borrow().classes.contains_key(class))
}

/// All registered class names, sorted.
pub fn class_names() -> Vec<String> {
    REGISTRY.with(|r| {
        let mut names: Vec<String> = r.borrow().classes.keys().cloned().collect();
        names.sort();
        names
    })
}

/// The active configuration.
pub fn config() -> EngineConfig {
    REGISTRY.with(|r| r.borrow().config.clone())
}

/// Replace the configuration and reinstall built-in classes and types.
/// Custom registrations are kept unless a built-in of the same name replaces
/// them.
pub fn configure(config: EngineConfig) {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        r.config = config;
        r.install_builtins();
        r.invalidate();
    });
}

/// Drop memoized tables and expression types. Registrations survive.
pub fn clear() {
    REGISTRY.with(|r| r.borrow_mut().invalidate());
}
