//! Two-pass page composition.
//!
//! A page moves through `Page -> ExpandedPage -> ComposedPage -> written`:
//!
//! 1. Expand: the page template runs with the component templates and the
//!    helpers, recording which components it uses.
//! 2. The recorded forest, grown by the forests of the dynamic components it
//!    reaches, is checked for cycles and flattened, dependencies first.
//! 3. Styles, scripts and dynamic templates the page places are collected
//!    concurrently.
//! 4. Compose: `{!{ import ... }!}` directives receive the collected imports.
//! 5. The result is written under the output directory.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Component as PathComponent, Path, PathBuf},
    sync::Arc,
};

use minijinja::Environment;
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;
use wed_core::{
    Component, DependencyForest, GraphError, ModuleKind, Settings,
    settings::{SCRIPT_DIR, STYLE_DIR},
};

use crate::{
    bundler::{AssetKind, BundleRequest, Bundler, BundlerError},
    fetch::ContentFetcher,
    helpers::{ComponentInfo, HelperFailure, Helpers, TemplateError, recover},
    imports::{ImportKind, ImportTemplate, Imports},
    registry::{Catalog, Registry, RegistryError, RenderedDynamic, base_environment},
    runtime,
};

/// Failure of one page.
#[derive(Debug, Error)]
pub enum PageError {
    /// Template execution failed.
    #[error("page '{page}': {source}")]
    Template {
        page: String,
        #[source]
        source: TemplateError,
    },

    /// Unknown or circular component dependency.
    #[error("page '{page}': {source}")]
    Graph {
        page: String,
        #[source]
        source: GraphError,
    },

    /// The bundler rejected the page's assets.
    #[error(transparent)]
    Bundler(#[from] BundlerError),

    /// The composed page could not be written.
    #[error("page '{page}': cannot write {}: {source}", path.display())]
    Write {
        page: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PageError {
    /// Name of the failed page.
    #[must_use]
    pub fn page(&self) -> &str {
        match self {
            Self::Template { page, .. } | Self::Graph { page, .. } | Self::Write { page, .. } => {
                page
            }
            Self::Bundler(err) => &err.page,
        }
    }

    fn template(page: &str, source: TemplateError) -> Self {
        Self::Template {
            page: page.to_string(),
            source,
        }
    }

    fn graph(page: &str, source: GraphError) -> Self {
        Self::Graph {
            page: page.to_string(),
            source,
        }
    }
}

/// Result type for page operations.
pub type Result<T> = std::result::Result<T, PageError>;

/// A page template, checked for syntax.
#[derive(Debug, Clone)]
pub struct Page {
    name: String,
    source: String,
}

impl Page {
    /// Parse a page named by its path relative to the input directory,
    /// without extension.
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();

        let env = base_environment();
        if let Err(e) = env.template_from_str(&source) {
            return Err(PageError::template(&name, TemplateError::Render(e.to_string())));
        }

        Ok(Self { name, source })
    }

    /// Page name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A page after the first pass.
#[derive(Debug, Clone)]
pub struct ExpandedPage {
    pub name: String,
    pub html: String,
    pub forest: DependencyForest,
}

/// A page after the second pass, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPage {
    pub name: String,
    /// Location relative to the output directory.
    pub location: PathBuf,
    pub html: String,
}

/// Composes pages against one registry snapshot.
pub struct Compositor {
    settings: Arc<Settings>,
    catalog: Arc<Catalog>,
    env: Environment<'static>,
    dynamics: BTreeMap<String, RenderedDynamic>,
    vars: Arc<BTreeMap<String, serde_json::Value>>,
    bundler: Arc<dyn Bundler>,
    fetcher: Arc<dyn ContentFetcher>,
}

impl Compositor {
    /// Snapshot the registry, including its pre-rendered dynamic components.
    pub fn new(
        settings: Arc<Settings>,
        registry: &Registry,
        bundler: Arc<dyn Bundler>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> std::result::Result<Self, RegistryError> {
        Ok(Self {
            vars: Arc::new(settings.vars.clone()),
            catalog: Arc::new(registry.catalog()),
            env: registry.environment()?,
            dynamics: registry.rendered(),
            settings,
            bundler,
            fetcher,
        })
    }

    /// Expand, compose and write a page, returning the written file.
    pub fn run(&self, page: &Page) -> Result<PathBuf> {
        let expanded = self.expand(page)?;
        let composed = self.compose(expanded)?;
        self.write(&composed)
    }

    /// First pass: render the page with components and helpers.
    pub fn expand(&self, page: &Page) -> Result<ExpandedPage> {
        let helpers = Helpers::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.vars),
            Arc::clone(&self.fetcher),
            page.name(),
        );
        let mut env = self.env.clone();
        helpers.install(&mut env);

        let ctx = helpers.context(page.name(), ComponentInfo::new());
        let html = env
            .render_named_str(page.name(), page.source(), ctx)
            .map_err(|e| match recover(&e) {
                HelperFailure::Graph(source) => PageError::graph(page.name(), source),
                HelperFailure::Template(source) => PageError::template(page.name(), source),
            })?;

        let forest = helpers.take_forest();
        debug!(page = page.name(), uses = forest.roots().len(), "expanded page");

        Ok(ExpandedPage {
            name: page.name().to_string(),
            html,
            forest,
        })
    }

    /// Second pass: resolve imports and substitute them.
    pub fn compose(&self, expanded: ExpandedPage) -> Result<ComposedPage> {
        let name = expanded.name.as_str();

        let forest = self.with_dynamic_forests(&expanded.forest);
        forest
            .check_acyclic(&*self.catalog)
            .map_err(|e| PageError::graph(name, e))?;
        let order = forest.flatten(&*self.catalog);
        let components: Vec<&Component> = order
            .iter()
            .filter_map(|n| self.catalog.get(n).map(|c| &**c))
            .collect();

        let template =
            ImportTemplate::parse(&expanded.html).map_err(|e| PageError::template(name, e))?;
        let location = match template.location() {
            Some(location) => checked_location(location).map_err(|e| PageError::template(name, e))?,
            None => PathBuf::from(format!("{name}.html")),
        };
        let depth = location.components().count().saturating_sub(1);

        let placed = |kind| template.uses(kind);
        let (styles, (scripts, dynamics)) = rayon::join(
            || {
                if placed(ImportKind::Styles) {
                    self.styles(name, &components, depth)
                } else {
                    Ok(String::new())
                }
            },
            || {
                rayon::join(
                    || {
                        if placed(ImportKind::Scripts) {
                            self.scripts(name, &components, depth)
                        } else {
                            Ok(String::new())
                        }
                    },
                    || {
                        if placed(ImportKind::Dynamics) {
                            self.dynamics(&components)
                        } else {
                            String::new()
                        }
                    },
                )
            },
        );

        let imports = Imports {
            styles: styles?,
            scripts: scripts?,
            dynamics,
        };

        debug!(
            page = name,
            components = components.len(),
            location = %location.display(),
            "composed page"
        );

        Ok(ComposedPage {
            name: expanded.name.clone(),
            location,
            html: template.render(&imports),
        })
    }

    /// Write a composed page.
    pub fn write(&self, composed: &ComposedPage) -> Result<PathBuf> {
        let path = self.settings.output_dir.join(&composed.location);
        let write_error = |source| PageError::Write {
            page: composed.name.clone(),
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&path, &composed.html).map_err(write_error)?;

        debug!(path = %path.display(), "wrote page");
        Ok(path)
    }

    /// Add the forests recorded while pre-rendering every dynamic component
    /// the page reaches, until no new one turns up.
    fn with_dynamic_forests(&self, page: &DependencyForest) -> DependencyForest {
        let mut forest = page.clone();
        let mut merged = BTreeSet::new();

        loop {
            let pending: Vec<&RenderedDynamic> = forest
                .flatten(&*self.catalog)
                .into_iter()
                .filter(|n| merged.insert(n.clone()))
                .filter_map(|n| self.dynamics.get(&n))
                .collect();
            if pending.is_empty() {
                return forest;
            }
            for dynamic in pending {
                for root in dynamic.forest.roots() {
                    forest.push(root.clone());
                }
            }
        }
    }

    fn styles(
        &self,
        page: &str,
        components: &[&Component],
        depth: usize,
    ) -> std::result::Result<String, BundlerError> {
        let mut tags = Vec::new();
        if self.settings.runtime {
            tags.push(
                self.settings
                    .style_tag(&runtime::STYLE.url(&self.settings, depth)),
            );
        }

        let entries: Vec<PathBuf> = components
            .iter()
            .filter(|c| c.has_style())
            .map(|c| self.settings.style_path(&c.name))
            .collect();
        if entries.is_empty() {
            return Ok(tags.join("\n"));
        }

        let out_dir = self.settings.output_dir.join(STYLE_DIR);
        let outputs = self
            .bundler
            .bundle(&BundleRequest {
                page,
                kind: AssetKind::Css,
                entries: &entries,
                out_dir: &out_dir,
                module: None,
            })
            .map_err(|diagnostics| BundlerError {
                page: page.to_string(),
                kind: AssetKind::Css,
                diagnostics,
            })?;

        tags.extend(outputs.iter().map(|output| {
            self.settings
                .style_tag(&self.settings.output_url(output, depth))
        }));
        Ok(tags.join("\n"))
    }

    fn scripts(
        &self,
        page: &str,
        components: &[&Component],
        depth: usize,
    ) -> std::result::Result<String, BundlerError> {
        let scripts: Vec<(&Component, ModuleKind)> = components
            .iter()
            .filter(|c| c.has_script())
            .map(|c| (*c, c.module_or(self.settings.module)))
            .collect();

        let mut tags = Vec::new();
        if self.settings.runtime {
            let url = runtime::UTILS.url(&self.settings, depth);
            tags.push(self.settings.script_tag(&url, false, ModuleKind::Classic));
            if scripts.iter().any(|(_, m)| *m == ModuleKind::EsModule) {
                tags.push(runtime::import_map(&self.settings, depth));
            }
        }
        if scripts.is_empty() {
            return Ok(tags.join("\n"));
        }

        let mut partitions: Vec<((ModuleKind, bool), Vec<&str>)> = Vec::new();
        for (component, module) in &scripts {
            let key = (*module, component.preload);
            match partitions.iter_mut().find(|(k, _)| *k == key) {
                Some((_, names)) => names.push(component.name.as_str()),
                None => partitions.push((key, vec![component.name.as_str()])),
            }
        }

        let out_dir = self.settings.output_dir.join(SCRIPT_DIR);
        let bundled: Vec<std::result::Result<Vec<(&str, PathBuf)>, Vec<String>>> = partitions
            .par_iter()
            .map(|((module, _), names)| {
                let entries: Vec<PathBuf> = names
                    .iter()
                    .map(|n| self.settings.script_path(n))
                    .collect();
                let outputs = self.bundler.bundle(&BundleRequest {
                    page,
                    kind: AssetKind::Js,
                    entries: &entries,
                    out_dir: &out_dir,
                    module: Some(*module),
                })?;
                Ok(names.iter().copied().zip(outputs).collect())
            })
            .collect();

        let mut outputs: BTreeMap<&str, PathBuf> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for result in bundled {
            match result {
                Ok(pairs) => outputs.extend(pairs),
                Err(errors) => diagnostics.extend(errors),
            }
        }
        if !diagnostics.is_empty() {
            return Err(BundlerError {
                page: page.to_string(),
                kind: AssetKind::Js,
                diagnostics,
            });
        }

        tags.extend(scripts.iter().filter_map(|(component, module)| {
            let output = outputs.get(component.name.as_str())?;
            let url = self.settings.output_url(output, depth);
            Some(self.settings.script_tag(&url, !component.preload, *module))
        }));
        Ok(tags.join("\n"))
    }

    fn dynamics(&self, components: &[&Component]) -> String {
        components
            .iter()
            .filter(|c| c.kind.is_dynamic())
            .filter_map(|c| self.dynamics.get(&c.name))
            .map(|d| d.html.as_str())
            .collect()
    }
}

/// Validate a `page` directive location: relative, inside the output
/// directory. `.` segments are dropped.
fn checked_location(location: &str) -> std::result::Result<PathBuf, TemplateError> {
    let invalid = || {
        TemplateError::InvalidDirective(format!(
            "page location \"{location}\" must be a relative path inside the output directory"
        ))
    };

    let mut path = PathBuf::new();
    for component in Path::new(location).components() {
        match component {
            PathComponent::Normal(part) => path.push(part),
            PathComponent::CurDir => {}
            _ => return Err(invalid()),
        }
    }
    if path.as_os_str().is_empty() {
        return Err(invalid());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{bundler::MinifyBundler, fetch::HttpFetcher};

    const HEAD: &str = r#"{!{ import "styles" }!}{!{ import "scripts" }!}"#;

    fn compositor(out: &Path, components: &[(&str, &str)]) -> Compositor {
        let registry = Registry::new();
        for (name, source) in components {
            registry
                .register(
                    Component::parse(*name, source).unwrap(),
                    format!("{name}.wed.html"),
                )
                .unwrap();
        }
        for component in registry.catalog().iter() {
            if component.kind.is_dynamic() {
                registry.store_rendered(
                    &component.name,
                    component.wrapped_dynamic_html(),
                    DependencyForest::new(),
                );
            }
        }

        let mut settings = Settings::new(".", out);
        settings.runtime = false;
        settings
            .vars
            .insert("site".to_string(), serde_json::json!("Demo"));
        Compositor::new(
            Arc::new(settings),
            &registry,
            Arc::new(MinifyBundler::new(false)),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap()
    }

    fn compose(compositor: &Compositor, name: &str, source: &str) -> Result<ComposedPage> {
        let page = Page::parse(name, source)?;
        let expanded = compositor.expand(&page)?;
        compositor.compose(expanded)
    }

    #[test]
    fn test_page_syntax_error() {
        let err = Page::parse("broken", "{% if %}").unwrap_err();
        assert_eq!(err.page(), "broken");
        assert!(matches!(err, PageError::Template { .. }));
    }

    #[test]
    fn test_expand_records_forest() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(
            dir.path(),
            &[("btn", "<html><button>{{ vars.site }}</button></html>")],
        );

        let page = Page::parse("index", r#"<main>{{ use("btn") }}</main>"#).unwrap();
        let expanded = compositor.expand(&page).unwrap();

        assert_eq!(
            expanded.html,
            r#"<main><div class="btn-component wed-component"><button>Demo</button></div></main>"#
        );
        assert_eq!(expanded.forest.roots().len(), 1);
    }

    #[test]
    fn test_styles_and_scripts_in_dependency_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path();
        let compositor = compositor(
            out,
            &[
                (
                    "app",
                    r#"<html><main/></html><style>main{}</style><script require="util icon">app()</script>"#,
                ),
                ("util", "<html><i/></html><script>util()</script>"),
                (
                    "icon",
                    r#"<html><b/></html><style>b{}</style><script type="module" preload>icon()</script>"#,
                ),
            ],
        );

        let composed = compose(&compositor, "index", &format!(r#"{HEAD}{{{{ use("app") }}}}"#)).unwrap();

        let style_icon = r#"<link rel="stylesheet" href="style/icon.css">"#;
        let style_app = r#"<link rel="stylesheet" href="style/app.css">"#;
        let util = r#"<script defer type="text/javascript" src="script/util.js"></script>"#;
        let icon = r#"<script type="module" src="script/icon.js"></script>"#;
        let app = r#"<script defer type="text/javascript" src="script/app.js"></script>"#;

        let expected = format!("{style_icon}\n{style_app}{util}\n{icon}\n{app}");
        assert!(composed.html.starts_with(&expected), "{}", composed.html);
        assert_eq!(composed.location, PathBuf::from("index.html"));
    }

    #[test]
    fn test_nested_page_urls() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(
            dir.path(),
            &[("btn", "<html><a/></html><style>a{}</style>")],
        );

        let composed = compose(
            &compositor,
            "blog/post",
            r#"{!{ import "styles" }!}{{ use("btn") }}"#,
        )
        .unwrap();

        assert_eq!(composed.location, PathBuf::from("blog/post.html"));
        assert!(
            composed
                .html
                .contains(r#"<link rel="stylesheet" href="../style/btn.css">"#)
        );
    }

    #[test]
    fn test_page_directive_moves_output() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(dir.path(), &[]);

        let composed = compose(
            &compositor,
            "home",
            r#"{!{ page "a/b/index.html" }!}<p>{{ page }}</p>"#,
        )
        .unwrap();
        assert_eq!(composed.location, PathBuf::from("a/b/index.html"));
        assert_eq!(composed.html, "<p>home</p>");

        let written = compositor.write(&composed).unwrap();
        assert_eq!(written, dir.path().join("a/b/index.html"));
        assert_eq!(fs::read_to_string(written).unwrap(), "<p>home</p>");
    }

    #[test]
    fn test_page_directive_current_dir_stays_at_root() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(
            dir.path(),
            &[("btn", "<html><a/></html><style>a{}</style>")],
        );

        let composed = compose(
            &compositor,
            "home",
            r#"{!{ page "./index.html" }!}{!{ import "styles" }!}{{ use("btn") }}"#,
        )
        .unwrap();

        assert_eq!(composed.location, PathBuf::from("index.html"));
        assert!(
            composed
                .html
                .starts_with(r#"<link rel="stylesheet" href="style/btn.css">"#),
            "{}",
            composed.html
        );
    }

    #[test]
    fn test_page_directive_outside_output_rejected() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(dir.path(), &[]);

        for location in ["../escape.html", "/etc/passwd", "./", "a/../../b.html"] {
            let source = format!(r#"{{!{{ page "{location}" }}!}}"#);
            let err = compose(&compositor, "x", &source).unwrap_err();
            assert!(
                matches!(
                    err,
                    PageError::Template {
                        source: TemplateError::InvalidDirective(_),
                        ..
                    }
                ),
                "{location}"
            );
        }
    }

    #[test]
    fn test_only_reachable_dynamics_imported() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(
            dir.path(),
            &[
                ("modal", r#"<html type="dynamic"><dialog/></html>"#),
                ("card", r#"<html type="dynamic"><article/></html>"#),
                (
                    "opener",
                    r#"<html type="hybrid"><button/></html><script require="modal">open()</script>"#,
                ),
            ],
        );

        let composed = compose(
            &compositor,
            "index",
            r#"{{ use("opener") }}{!{ import "dynamics" }!}"#,
        )
        .unwrap();

        assert!(composed.html.contains(r#"<template id="modal-component">"#));
        assert!(composed.html.contains(r#"<template id="opener-component">"#));
        assert!(!composed.html.contains("card-component"));
    }

    #[test]
    fn test_assets_inside_dynamics_are_linked() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        for (name, source) in [
            ("modal", r#"<html type="dynamic"><dialog>{{ use("btn") }}</dialog></html>"#),
            ("btn", "<html><a/></html><style>a{}</style><script>btn()</script>"),
        ] {
            registry
                .register(Component::parse(name, source).unwrap(), format!("{name}.wed.html"))
                .unwrap();
        }
        let mut inner = DependencyForest::new();
        inner.push(wed_core::Dependency {
            consumer: "modal".to_string(),
            name: "btn".to_string(),
        });
        registry.store_rendered("modal", "<template id=\"modal-component\"></template>", inner);

        let mut settings = Settings::new(".", dir.path());
        settings.runtime = false;
        let compositor = Compositor::new(
            Arc::new(settings),
            &registry,
            Arc::new(MinifyBundler::new(false)),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap();

        let composed = compose(
            &compositor,
            "index",
            &format!(r#"{HEAD}{{{{ use("modal") }}}}{{!{{ import "dynamics" }}!}}"#),
        )
        .unwrap();

        assert!(composed.html.contains(r#"href="style/btn.css""#), "{}", composed.html);
        assert!(composed.html.contains(r#"src="script/btn.js""#), "{}", composed.html);
        assert!(composed.html.contains(r#"<template id="modal-component">"#));
    }

    #[test]
    fn test_runtime_linked_before_components() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        registry
            .register(
                Component::parse(
                    "chart",
                    r#"<html><canvas/></html><style>canvas{}</style><script type="module">draw()</script>"#,
                )
                .unwrap(),
                "chart.wed.html",
            )
            .unwrap();
        let compositor = Compositor::new(
            Arc::new(Settings::new(".", dir.path())),
            &registry,
            Arc::new(MinifyBundler::new(false)),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap();

        let composed = compose(
            &compositor,
            "docs/index",
            &format!(r#"{HEAD}{{{{ use("chart") }}}}"#),
        )
        .unwrap();

        let expected = [
            r#"<link rel="stylesheet" href="../style/wed-style.css">"#,
            r#"<link rel="stylesheet" href="../style/chart.css">"#,
        ]
        .join("\n");
        let scripts = [
            r#"<script type="text/javascript" src="../script/wed-utils.js"></script>"#,
            r#"<script type="importmap">{ "imports": { "@wed/utils": "../script/wed-utils.mjs", "@wed/http": "../script/wed-http.mjs" } }</script>"#,
            r#"<script defer type="module" src="../script/chart.js"></script>"#,
        ]
        .join("\n");
        assert!(
            composed.html.starts_with(&format!("{expected}{scripts}")),
            "{}",
            composed.html
        );
    }

    #[test]
    fn test_runtime_without_modules_has_no_import_map() {
        let dir = TempDir::new().unwrap();
        let compositor = Compositor::new(
            Arc::new(Settings::new(".", dir.path())),
            &Registry::new(),
            Arc::new(MinifyBundler::new(false)),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap();

        let composed = compose(&compositor, "index", r#"{!{ import "scripts" }!}<p/>"#).unwrap();

        assert_eq!(
            composed.html,
            r#"<script type="text/javascript" src="script/wed-utils.js"></script><p/>"#
        );
    }

    #[test]
    fn test_unplaced_imports_skip_bundling() {
        struct Failing;

        impl Bundler for Failing {
            fn bundle(&self, _: &BundleRequest<'_>) -> std::result::Result<Vec<PathBuf>, Vec<String>> {
                Err(vec!["boom".to_string()])
            }
        }

        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        registry
            .register(
                Component::parse("s", "<html><p>s</p></html><style>p{}</style>").unwrap(),
                "s.wed.html",
            )
            .unwrap();
        let compositor = Compositor::new(
            Arc::new(Settings::new(".", dir.path())),
            &registry,
            Arc::new(Failing),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap();

        let composed = compose(&compositor, "index", r#"{{ use("s") }}"#).unwrap();
        assert_eq!(composed.html, r#"<div class="s-component wed-component"><p>s</p></div>"#);
    }

    #[test]
    fn test_circular_dependency_fails_page() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(
            dir.path(),
            &[
                ("a", r#"<html><p>a</p></html><script require="b">a()</script>"#),
                ("b", r#"<html><p>b</p></html><script require="a">b()</script>"#),
            ],
        );

        let err = compose(&compositor, "index", r#"{{ use("a") }}"#).unwrap_err();

        match err {
            PageError::Graph {
                page,
                source: GraphError::CircularDependency { names },
            } => {
                assert_eq!(page, "index");
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_import_fails_page() {
        let dir = TempDir::new().unwrap();
        let compositor = compositor(dir.path(), &[]);

        let err = compose(&compositor, "index", r#"{!{ import "fonts" }!}"#).unwrap_err();

        assert!(matches!(
            err,
            PageError::Template {
                source: TemplateError::UnknownImport(ref value),
                ..
            } if value == "fonts"
        ));
    }

    #[test]
    fn test_bundler_failure_is_tagged() {
        struct Failing;

        impl Bundler for Failing {
            fn bundle(&self, _: &BundleRequest<'_>) -> std::result::Result<Vec<PathBuf>, Vec<String>> {
                Err(vec!["boom".to_string()])
            }
        }

        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        registry
            .register(
                Component::parse("s", "<html><p>s</p></html><style>p{}</style>").unwrap(),
                "s.wed.html",
            )
            .unwrap();
        let compositor = Compositor::new(
            Arc::new(Settings::new(".", dir.path())),
            &registry,
            Arc::new(Failing),
            Arc::new(HttpFetcher::new(".")),
        )
        .unwrap();

        let err = compose(&compositor, "index", r#"{!{ import "styles" }!}{{ use("s") }}"#)
            .unwrap_err();

        match err {
            PageError::Bundler(err) => {
                assert_eq!(err.page, "index");
                assert_eq!(err.kind, AssetKind::Css);
                assert_eq!(err.diagnostics.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
