//! Wednesday Generator Library
//!
//! Turns a tree of components and page templates into a static site.
//!
//! # Modules
//!
//! - [`registry`] - Shared component namespace and template environment
//! - [`helpers`] - Template helpers (`use`, `props`, `hold`, `drop`, `var`, `embed`, `list`)
//! - [`imports`] - Second-pass import directives
//! - [`page`] - Two-pass page composition
//! - [`bundler`] - Style and script emission
//! - [`runtime`] - Site runtime files linked from every page
//! - [`fetch`] - Content fetching for `embed`
//! - [`build`] - Build orchestration

pub mod build;
pub mod bundler;
pub mod fetch;
pub mod helpers;
pub mod imports;
pub mod page;
pub mod registry;
pub mod runtime;

pub use build::{BuildError, BuildReport, BuildStats, Builder, build};
pub use bundler::{AssetKind, BundleRequest, Bundler, BundlerError, MinifyBundler};
pub use fetch::{ContentFetcher, HttpFetcher};
pub use helpers::{ComponentInfo, HelperFailure, Helpers, TemplateError};
pub use imports::{ImportKind, ImportTemplate, Imports};
pub use page::{ComposedPage, Compositor, ExpandedPage, Page, PageError};
pub use registry::{Catalog, Registry, RegistryError, RenderedDynamic};
