//! Build orchestration.
//!
//! Coordinates the full site build process:
//!
//! 1. Walk the input tree, parsing and registering components and checking
//!    pages. Every defect in the tree is collected.
//! 2. Only when the walk is clean:
//!    a. write every component's style and script side files, plus the site
//!       runtime when enabled,
//!    b. pre-render every dynamic component,
//!    c. compose every page.
//!
//! Tasks inside a phase all run to completion; a failed phase stops the next.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};
use wed_core::{COMPONENT_EXT, Component, ComponentError, CoreError, PAGE_EXT, Settings};

use crate::{
    bundler::{Bundler, MinifyBundler},
    fetch::{ContentFetcher, HttpFetcher},
    helpers::{ComponentInfo, HelperFailure, Helpers, recover},
    page::{Compositor, Page, PageError},
    registry::{Catalog, Registry, RegistryError, dynamic_template},
    runtime::{self, RuntimeFile},
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid settings.
    #[error(transparent)]
    Settings(#[from] CoreError),

    /// The input tree could not be traversed.
    #[error("cannot walk {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },

    /// A source file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A component source is invalid.
    #[error("{}: {source}", path.display())]
    Component {
        path: PathBuf,
        #[source]
        source: ComponentError,
    },

    /// Registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A side file could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A dynamic component failed to render.
    #[error("dynamic component '{name}': {source}")]
    Dynamic {
        name: String,
        #[source]
        source: HelperFailure,
    },

    /// A page failed.
    #[error(transparent)]
    Page(#[from] PageError),
}

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of registered components.
    pub components: usize,

    /// Number of pages written.
    pub pages: usize,

    /// Number of style, script and runtime files written.
    pub static_files: usize,

    /// Number of dynamic components rendered.
    pub dynamics: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Outcome of a build: what was produced and every error collected.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub stats: BuildStats,
    pub errors: Vec<BuildError>,
}

impl BuildReport {
    /// A build succeeded when it collected no error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run a build with the default bundler and fetcher.
pub fn build(settings: Settings) -> Vec<BuildError> {
    Builder::new(settings).build().errors
}

enum Source {
    Component { name: String, path: PathBuf },
    Page { name: String, path: PathBuf },
}

/// Site builder that orchestrates the build process.
pub struct Builder {
    settings: Arc<Settings>,
    bundler: Arc<dyn Bundler>,
    fetcher: Arc<dyn ContentFetcher>,
}

impl Builder {
    /// Create a new builder.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let bundler = Arc::new(MinifyBundler::new(settings.minify));
        let fetcher = Arc::new(HttpFetcher::new(&settings.input_dir));
        Self {
            settings: Arc::new(settings),
            bundler,
            fetcher,
        }
    }

    /// Replace the asset bundler.
    #[must_use]
    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = bundler;
        self
    }

    /// Replace the content fetcher used by `embed`.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Settings of this build.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute the full build process.
    pub fn build(&self) -> BuildReport {
        let start = Instant::now();
        let mut report = BuildReport::default();

        info!(
            input = %self.settings.input_dir.display(),
            output = %self.settings.output_dir.display(),
            "starting build"
        );

        if let Err(e) = self.settings.validate() {
            report.errors.push(e.into());
            return finish(report, start);
        }

        // 1. Walk
        let registry = Registry::new();
        let pages = self.walk(&registry, &mut report.errors);
        report.stats.components = registry.len();
        if !report.errors.is_empty() {
            warn!(errors = report.errors.len(), "input tree has errors, nothing written");
            return finish(report, start);
        }

        // 2a. Side files
        let catalog = Arc::new(registry.catalog());
        report.stats.static_files = self.write_statics(&catalog, &mut report.errors);
        if !report.errors.is_empty() {
            return finish(report, start);
        }

        // 2b. Dynamic components
        report.stats.dynamics = self.render_dynamics(&registry, &catalog, &mut report.errors);
        if !report.errors.is_empty() {
            return finish(report, start);
        }

        // 2c. Pages
        report.stats.pages = self.compose_pages(&registry, &pages, &mut report.errors);

        finish(report, start)
    }

    fn walk(&self, registry: &Registry, errors: &mut Vec<BuildError>) -> Vec<Page> {
        let input = &self.settings.input_dir;
        let output = fs::canonicalize(&self.settings.output_dir).ok();

        let mut sources = Vec::new();
        let walker = WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_output(entry, output.as_deref()));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(source) = classify(input, entry.path()) {
                        sources.push(source);
                    }
                }
                Ok(_) => {}
                Err(e) => errors.push(BuildError::Walk {
                    path: e.path().map_or_else(|| input.clone(), Path::to_path_buf),
                    message: e.to_string(),
                }),
            }
        }

        debug!(files = sources.len(), "collected sources");

        let loaded: Vec<Result<Option<Page>, BuildError>> = sources
            .par_iter()
            .map(|source| load(registry, source))
            .collect();

        let mut pages = Vec::new();
        for result in loaded {
            match result {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "invalid source");
                    errors.push(e);
                }
            }
        }

        info!(components = registry.len(), pages = pages.len(), "walked input tree");
        pages
    }

    fn write_statics(&self, catalog: &Catalog, errors: &mut Vec<BuildError>) -> usize {
        let runtime_files: &[RuntimeFile] = if self.settings.runtime {
            &runtime::FILES
        } else {
            &[]
        };
        let shipped: Vec<Result<(), BuildError>> = runtime_files
            .par_iter()
            .map(|file| write_file(&file.path(&self.settings), file.content))
            .collect();

        let components: Vec<&Arc<Component>> = catalog.iter().collect();
        let results: Vec<(usize, Vec<BuildError>)> = components
            .par_iter()
            .map(|component| {
                let mut written = 0;
                let mut failures = Vec::new();

                if let Some(style) = component.wrapped_style() {
                    match write_file(&self.settings.style_path(&component.name), &style) {
                        Ok(()) => written += 1,
                        Err(e) => failures.push(e),
                    }
                }
                if let Some(script) = component.script.as_deref().filter(|s| !s.trim().is_empty()) {
                    match write_file(&self.settings.script_path(&component.name), script) {
                        Ok(()) => written += 1,
                        Err(e) => failures.push(e),
                    }
                }

                (written, failures)
            })
            .collect();

        let mut count = 0;
        for result in shipped {
            match result {
                Ok(()) => count += 1,
                Err(e) => errors.push(e),
            }
        }
        for (written, failures) in results {
            count += written;
            errors.extend(failures);
        }

        info!(files = count, "wrote side files");
        count
    }

    fn render_dynamics(
        &self,
        registry: &Registry,
        catalog: &Arc<Catalog>,
        errors: &mut Vec<BuildError>,
    ) -> usize {
        let env = match registry.environment() {
            Ok(env) => env,
            Err(e) => {
                errors.push(e.into());
                return 0;
            }
        };
        let vars = Arc::new(self.settings.vars.clone());

        let dynamics: Vec<&Arc<Component>> = catalog.iter().filter(|c| c.kind.is_dynamic()).collect();
        let results: Vec<Result<(), BuildError>> = dynamics
            .par_iter()
            .map(|component| {
                let helpers = Helpers::new(
                    Arc::clone(catalog),
                    Arc::clone(&vars),
                    Arc::clone(&self.fetcher),
                    component.name.clone(),
                );
                let mut env = env.clone();
                helpers.install(&mut env);

                let html = env
                    .get_template(&dynamic_template(&component.name))
                    .and_then(|template| template.render(helpers.context("", ComponentInfo::new())))
                    .map_err(|e| BuildError::Dynamic {
                        name: component.name.clone(),
                        source: recover(&e),
                    })?;

                registry.store_rendered(component.name.clone(), html, helpers.take_forest());
                Ok(())
            })
            .collect();

        let mut count = 0;
        for result in results {
            match result {
                Ok(()) => count += 1,
                Err(e) => errors.push(e),
            }
        }

        debug!(dynamics = count, "rendered dynamic components");
        count
    }

    fn compose_pages(&self, registry: &Registry, pages: &[Page], errors: &mut Vec<BuildError>) -> usize {
        let compositor = match Compositor::new(
            Arc::clone(&self.settings),
            registry,
            Arc::clone(&self.bundler),
            Arc::clone(&self.fetcher),
        ) {
            Ok(compositor) => compositor,
            Err(e) => {
                errors.push(e.into());
                return 0;
            }
        };

        info!(count = pages.len(), "composing pages");

        let results: Vec<Result<PathBuf, PageError>> =
            pages.par_iter().map(|page| compositor.run(page)).collect();

        let mut count = 0;
        for result in results {
            match result {
                Ok(_) => count += 1,
                Err(e) => {
                    warn!(page = e.page(), error = %e, "failed to compose page");
                    errors.push(e.into());
                }
            }
        }
        count
    }
}

fn finish(mut report: BuildReport, start: Instant) -> BuildReport {
    report.stats.duration_ms = start.elapsed().as_millis() as u64;
    let stats = &report.stats;

    if report.is_success() {
        info!(
            components = stats.components,
            pages = stats.pages,
            static_files = stats.static_files,
            dynamics = stats.dynamics,
            duration_ms = stats.duration_ms,
            "build complete"
        );
    } else {
        warn!(
            errors = report.errors.len(),
            pages = stats.pages,
            duration_ms = stats.duration_ms,
            "build failed"
        );
    }
    report
}

fn is_output(entry: &DirEntry, output: Option<&Path>) -> bool {
    let Some(output) = output else {
        return false;
    };
    entry.depth() > 0
        && entry.file_type().is_dir()
        && fs::canonicalize(entry.path()).is_ok_and(|path| path == output)
}

fn classify(input: &Path, path: &Path) -> Option<Source> {
    let file_name = path.file_name()?.to_str()?;
    let lower = file_name.to_ascii_lowercase();

    if lower.ends_with(COMPONENT_EXT) {
        let name = &file_name[..file_name.len() - COMPONENT_EXT.len()];
        return (!name.is_empty()).then(|| Source::Component {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    if lower.ends_with(PAGE_EXT) {
        let relative = path.strip_prefix(input).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = &joined[..joined.len() - PAGE_EXT.len()];
        return (!name.is_empty() && !name.ends_with('/')).then(|| Source::Page {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    None
}

fn load(registry: &Registry, source: &Source) -> Result<Option<Page>, BuildError> {
    let path = match source {
        Source::Component { path, .. } | Source::Page { path, .. } => path,
    };
    let content = fs::read_to_string(path).map_err(|e| BuildError::Read {
        path: path.clone(),
        source: e,
    })?;

    match source {
        Source::Component { name, path } => {
            let component =
                Component::parse(name.as_str(), &content).map_err(|e| BuildError::Component {
                    path: path.clone(),
                    source: e,
                })?;
            registry.register(component, path.clone())?;
            Ok(None)
        }
        Source::Page { name, .. } => Ok(Some(Page::parse(name.as_str(), content)?)),
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, content).map_err(write_error)
}
