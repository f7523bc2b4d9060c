//! Wednesday Core Library
//!
//! Core types for the Wednesday component-based static site generator:
//! component parsing, the component dependency graph, settings and errors.

pub mod component;
pub mod dependency;
pub mod error;
pub mod settings;

pub use component::{Component, ComponentError, ComponentKind, ModuleKind};
pub use dependency::{Dependency, DependencyForest, GraphError, RequireLookup};
pub use error::{CoreError, Result};
pub use settings::Settings;

/// File suffix of component sources.
pub const COMPONENT_EXT: &str = ".wed.html";

/// File suffix of page templates.
pub const PAGE_EXT: &str = ".tmpl";

/// Class shared by every wrapped component.
pub const COMPONENT_CLASS: &str = "wed-component";
