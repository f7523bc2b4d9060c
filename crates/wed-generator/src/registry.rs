//! Component registry.
//!
//! One namespace shared by every page: components are registered while the
//! input tree is walked, then turned into a template [`Environment`] holding a
//! `wed-static-{name}` entry per static/hybrid component and a
//! `wed-dynamic-{name}` entry per dynamic/hybrid component.

use std::{
    collections::{BTreeMap, btree_map},
    path::PathBuf,
    sync::Arc,
};

use minijinja::{AutoEscape, Environment};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;
use wed_core::{Component, DependencyForest, RequireLookup};

use crate::runtime;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two components share a name.
    #[error(
        "duplicate component '{name}' in {} (already defined in {})",
        second.display(),
        first.display()
    )]
    DuplicateComponent {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The name would overwrite a site runtime file.
    #[error("component name '{name}' in {} is reserved for the site runtime", path.display())]
    ReservedName { name: String, path: PathBuf },

    /// Component markup is not a valid template.
    #[error("invalid template in component '{name}': {message}")]
    Syntax { name: String, message: String },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Template name of a component's inline form.
#[must_use]
pub fn static_template(name: &str) -> String {
    format!("wed-static-{name}")
}

/// Template name of a component's `<template>` form.
#[must_use]
pub fn dynamic_template(name: &str) -> String {
    format!("wed-dynamic-{name}")
}

/// A template environment with the settings every Wednesday template shares.
#[must_use]
pub fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env
}

/// Read-only snapshot of the registered components.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: BTreeMap<String, Arc<Component>>,
}

impl Catalog {
    /// Look up a component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Component>> {
        self.components.get(name)
    }

    /// Components ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Component>> {
        self.components.values()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl RequireLookup for Catalog {
    fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    fn requires(&self, name: &str) -> Option<&[String]> {
        self.components.get(name).map(|c| c.requires.as_slice())
    }
}

/// A dynamic component rendered once for the whole site.
#[derive(Debug, Clone, Default)]
pub struct RenderedDynamic {
    /// The `<template>` fragment.
    pub html: String,

    /// Components its markup used while rendering.
    pub forest: DependencyForest,
}

#[derive(Debug)]
struct Entry {
    component: Arc<Component>,
    source: PathBuf,
}

/// Concurrent component registry.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<String, Entry>>,
    rendered: RwLock<BTreeMap<String, RenderedDynamic>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component parsed from `source`.
    ///
    /// The name check and the insertion happen under one write lock.
    pub fn register(&self, component: Component, source: impl Into<PathBuf>) -> Result<()> {
        let source = source.into();
        if runtime::is_reserved(&component.name) {
            return Err(RegistryError::ReservedName {
                name: component.name,
                path: source,
            });
        }
        check_syntax(&component)?;

        let mut entries = self.entries.write();
        match entries.entry(component.name.clone()) {
            btree_map::Entry::Occupied(existing) => Err(RegistryError::DuplicateComponent {
                name: component.name,
                first: existing.get().source.clone(),
                second: source,
            }),
            btree_map::Entry::Vacant(slot) => {
                debug!(name = %component.name, kind = %component.kind, "registered component");
                slot.insert(Entry {
                    component: Arc::new(component),
                    source,
                });
                Ok(())
            }
        }
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the registered components.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        let components = self
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(&entry.component)))
            .collect();
        Catalog { components }
    }

    /// Build the shared template environment.
    pub fn environment(&self) -> Result<Environment<'static>> {
        let mut env = base_environment();
        for entry in self.entries.read().values() {
            let component = &entry.component;
            let syntax = |e: minijinja::Error| RegistryError::Syntax {
                name: component.name.clone(),
                message: e.to_string(),
            };

            if component.kind.is_static() {
                env.add_template_owned(
                    static_template(&component.name),
                    component.wrapped_static_html(),
                )
                .map_err(syntax)?;
            }
            if component.kind.is_dynamic() {
                env.add_template_owned(
                    dynamic_template(&component.name),
                    component.wrapped_dynamic_html(),
                )
                .map_err(syntax)?;
            }
        }
        Ok(env)
    }

    /// Store the pre-rendered `<template>` form of a dynamic component along
    /// with the components it used.
    pub fn store_rendered(
        &self,
        name: impl Into<String>,
        html: impl Into<String>,
        forest: DependencyForest,
    ) {
        let rendered = RenderedDynamic {
            html: html.into(),
            forest,
        };
        self.rendered.write().insert(name.into(), rendered);
    }

    /// Pre-rendered dynamic components by name.
    #[must_use]
    pub fn rendered(&self) -> BTreeMap<String, RenderedDynamic> {
        self.rendered.read().clone()
    }
}

fn check_syntax(component: &Component) -> Result<()> {
    let env = Environment::new();
    env.template_from_str(&component.html)
        .map(|_| ())
        .map_err(|e| RegistryError::Syntax {
            name: component.name.clone(),
            message: e.to_string(),
        })
}
