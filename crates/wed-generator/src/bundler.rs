//! Style and script emission.
//!
//! Pages hand their collected side files to a [`Bundler`], which returns the
//! files to link, one per entry. [`MinifyBundler`] links entries as they are,
//! or writes `<stem>.min.<ext>` copies minified with `minify_html`.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use wed_core::ModuleKind;

/// Kind of asset being bundled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Css,
    Js,
}

impl AssetKind {
    /// File extension of this kind.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => f.write_str("CSS"),
            Self::Js => f.write_str("JS"),
        }
    }
}

/// One bundler invocation.
#[derive(Debug, Clone, Copy)]
pub struct BundleRequest<'a> {
    /// Page the entries were collected for.
    pub page: &'a str,

    /// Kind of every entry.
    pub kind: AssetKind,

    /// Side files to bundle, in emission order.
    pub entries: &'a [PathBuf],

    /// Directory receiving bundled output.
    pub out_dir: &'a Path,

    /// Module format, scripts only.
    pub module: Option<ModuleKind>,
}

/// Asset bundler service.
pub trait Bundler: Send + Sync {
    /// Bundle the request's entries.
    ///
    /// Returns one output file per entry, in entry order, or the diagnostics
    /// explaining why bundling failed.
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<Vec<PathBuf>, Vec<String>>;
}

/// Bundling failed for one page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} bundler errors during {kind} bundling of page {page}: {}",
    .diagnostics.len(),
    .diagnostics.join("; ")
)]
pub struct BundlerError {
    pub page: String,
    pub kind: AssetKind,
    pub diagnostics: Vec<String>,
}

/// Default bundler.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyBundler {
    minify: bool,
}

impl MinifyBundler {
    /// Create a bundler, minifying when `minify` is set.
    #[must_use]
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    fn minify_entry(entry: &Path, kind: AssetKind, out_dir: &Path) -> Result<PathBuf, String> {
        let source = fs::read_to_string(entry).map_err(|e| format!("{}: {e}", entry.display()))?;
        let minified = minify_source(&source, kind);

        let stem = entry
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| format!("{}: invalid file name", entry.display()))?;
        let target = out_dir.join(format!("{stem}.min.{}", kind.extension()));

        fs::create_dir_all(out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;
        let mut file = tempfile::NamedTempFile::new_in(out_dir)
            .map_err(|e| format!("{}: {e}", out_dir.display()))?;
        file.write_all(minified.as_bytes())
            .map_err(|e| format!("{}: {e}", target.display()))?;
        file.persist(&target)
            .map_err(|e| format!("{}: {e}", target.display()))?;

        debug!(from = %entry.display(), to = %target.display(), "minified asset");
        Ok(target)
    }
}

impl Bundler for MinifyBundler {
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<Vec<PathBuf>, Vec<String>> {
        if !self.minify {
            return Ok(request.entries.to_vec());
        }

        let mut outputs = Vec::with_capacity(request.entries.len());
        let mut diagnostics = Vec::new();
        for entry in request.entries {
            match Self::minify_entry(entry, request.kind, request.out_dir) {
                Ok(output) => outputs.push(output),
                Err(message) => diagnostics.push(message),
            }
        }

        if diagnostics.is_empty() {
            Ok(outputs)
        } else {
            Err(diagnostics)
        }
    }
}

/// Minify a style sheet or script by running it through the HTML minifier
/// inside its own element.
fn minify_source(source: &str, kind: AssetKind) -> String {
    let (open, close) = match kind {
        AssetKind::Css => ("<style>", "</style>"),
        AssetKind::Js => ("<script>", "</script>"),
    };

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.minify_css = kind == AssetKind::Css;
    cfg.minify_js = kind == AssetKind::Js;

    let wrapped = format!("{open}{source}{close}");
    let minified = minify_html::minify(wrapped.as_bytes(), &cfg);
    let minified = String::from_utf8_lossy(&minified);

    match minified
        .strip_prefix(open)
        .and_then(|m| m.strip_suffix(close))
    {
        Some(inner) => inner.to_string(),
        None => source.to_string(),
    }
}
