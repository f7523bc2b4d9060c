//! Site runtime shipped next to component side files.
//!
//! Pages placing styles link `style/wed-style.css`; pages placing scripts
//! load `script/wed-utils.js`, plus an import map exposing `@wed/utils` and
//! `@wed/http` when any of their scripts is an ES module.

use std::path::PathBuf;

use wed_core::{
    Settings,
    settings::{SCRIPT_DIR, STYLE_DIR},
};

/// Base stylesheet.
pub const STYLE: RuntimeFile = RuntimeFile {
    dir: STYLE_DIR,
    file: "wed-style.css",
    content: include_str!("runtime/wed-style.css"),
};

/// Classic script exposing `window.wed`.
pub const UTILS: RuntimeFile = RuntimeFile {
    dir: SCRIPT_DIR,
    file: "wed-utils.js",
    content: include_str!("runtime/wed-utils.js"),
};

/// ES module mapped to `@wed/utils`.
pub const UTILS_MODULE: RuntimeFile = RuntimeFile {
    dir: SCRIPT_DIR,
    file: "wed-utils.mjs",
    content: include_str!("runtime/wed-utils.mjs"),
};

/// ES module mapped to `@wed/http`.
pub const HTTP_MODULE: RuntimeFile = RuntimeFile {
    dir: SCRIPT_DIR,
    file: "wed-http.mjs",
    content: include_str!("runtime/wed-http.mjs"),
};

/// Every runtime file, in writing order.
pub const FILES: [RuntimeFile; 4] = [STYLE, UTILS, UTILS_MODULE, HTTP_MODULE];

/// A runtime file written under the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeFile {
    pub dir: &'static str,
    pub file: &'static str,
    pub content: &'static str,
}

impl RuntimeFile {
    /// Location under the output directory.
    #[must_use]
    pub fn path(&self, settings: &Settings) -> PathBuf {
        settings.output_dir.join(self.dir).join(self.file)
    }

    /// URL as seen from a page `depth` directories deep.
    #[must_use]
    pub fn url(&self, settings: &Settings, depth: usize) -> String {
        settings.output_url(&self.path(settings), depth)
    }

    /// Component name whose side file would land on this file.
    #[must_use]
    pub fn component_name(&self) -> Option<&'static str> {
        self.file
            .strip_suffix(".css")
            .or_else(|| self.file.strip_suffix(".js"))
    }
}

/// Whether a component name would overwrite a runtime file.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    FILES.iter().any(|f| f.component_name() == Some(name))
}

/// Import map resolving the runtime modules.
#[must_use]
pub fn import_map(settings: &Settings, depth: usize) -> String {
    format!(
        r#"<script type="importmap">{{ "imports": {{ "@wed/utils": "{}", "@wed/http": "{}" }} }}</script>"#,
        UTILS_MODULE.url(settings, depth),
        HTTP_MODULE.url(settings, depth)
    )
}
