//! Build settings.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    component::ModuleKind,
    error::{CoreError, Result},
};

/// Directory (under the output directory) holding component styles.
pub const STYLE_DIR: &str = "style";

/// Directory (under the output directory) holding component scripts.
pub const SCRIPT_DIR: &str = "script";

/// Settings consumed read-only by a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where generated pages and side files are written.
    pub output_dir: PathBuf,

    /// Root of the component and page tree.
    pub input_dir: PathBuf,

    /// Site variables, available to templates through `var` and `vars`.
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Named commands. Carried along for tooling, never read by a build.
    pub commands: BTreeMap<String, Vec<String>>,

    /// Module kind used by scripts that do not declare one.
    pub module: ModuleKind,

    /// Minify bundled styles and scripts.
    pub minify: bool,

    /// Ship the `wed-style`/`wed-utils` runtime and link it from every page
    /// placing styles or scripts.
    pub runtime: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("build"),
            input_dir: PathBuf::from("."),
            vars: BTreeMap::new(),
            commands: BTreeMap::new(),
            module: ModuleKind::default(),
            minify: false,
            runtime: true,
        }
    }
}

impl Settings {
    /// Settings for the given input and output directories, defaults elsewhere.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings from a TOML or JSON file, with `WED__*` environment
    /// variables layered on top.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let layered = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("WED").separator("__"))
            .build()
            .map_err(|e| {
                CoreError::config_with_source(
                    format!("Failed to read settings file: {}", path.display()),
                    e,
                )
            })?;

        let settings: Settings = layered.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load settings from `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(CoreError::config("output_dir cannot be empty"));
        }

        if normalize(&self.output_dir) == normalize(&self.input_dir) {
            return Err(CoreError::config(format!(
                "output_dir cannot be the input directory ({})",
                self.input_dir.display()
            )));
        }

        Ok(())
    }

    /// Style side file of a component.
    #[must_use]
    pub fn style_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(STYLE_DIR).join(format!("{name}.css"))
    }

    /// Script side file of a component.
    #[must_use]
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(SCRIPT_DIR).join(format!("{name}.js"))
    }

    /// URL of any file under the output directory, relative to a page.
    #[must_use]
    pub fn output_url(&self, file: &Path, depth: usize) -> String {
        let relative = file.strip_prefix(&self.output_dir).unwrap_or(file);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{joined}", "../".repeat(depth))
    }

    /// Stylesheet link for a URL.
    #[must_use]
    pub fn style_tag(&self, url: &str) -> String {
        format!(r#"<link rel="stylesheet" href="{url}">"#)
    }

    /// Script tag for a URL.
    #[must_use]
    pub fn script_tag(&self, url: &str, deferred: bool, module: ModuleKind) -> String {
        let defer = if deferred { "defer " } else { "" };
        format!(r#"<script {defer}type="{module}" src="{url}"></script>"#)
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.output_dir, PathBuf::from("build"));
        assert_eq!(settings.input_dir, PathBuf::from("."));
        assert!(settings.vars.is_empty());
        assert_eq!(settings.module, ModuleKind::Classic);
        assert!(!settings.minify);
        assert!(settings.runtime);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("wed.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "dist"
input_dir = "site"
module = "ecma"
minify = true
runtime = false

[vars]
title = "Hello"
count = 3

[commands]
serve = ["python", "-m", "http.server"]
"#,
        )
        .expect("write");

        let settings = Settings::load(&path).expect("load settings");

        assert_eq!(settings.output_dir, PathBuf::from("dist"));
        assert_eq!(settings.input_dir, PathBuf::from("site"));
        assert_eq!(settings.module, ModuleKind::EsModule);
        assert!(settings.minify);
        assert!(!settings.runtime);
        assert_eq!(settings.vars.get("title"), Some(&serde_json::json!("Hello")));
        assert_eq!(settings.commands["serve"].len(), 3);
    }

    #[test]
    fn test_load_json_partial() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("wed.json");
        std::fs::write(&path, r#"{ "vars": { "lang": "it" } }"#).expect("write");

        let settings = Settings::load(&path).expect("load settings");

        assert_eq!(settings.output_dir, PathBuf::from("build"));
        assert_eq!(settings.vars.get("lang"), Some(&serde_json::json!("it")));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut settings = Settings::new("src", "public");
        settings.module = ModuleKind::EsModule;

        let text = toml::to_string(&settings).expect("serialize");
        assert!(text.contains(r#"module = "module""#));

        let back: Settings = toml::from_str(&text).expect("deserialize");
        assert_eq!(back, settings);
    }

    #[test]
    fn test_invalid_module_rejected() {
        let result: std::result::Result<Settings, _> = toml::from_str(r#"module = "amd""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_not_found() {
        let result = Settings::load(Path::new("/nonexistent/wed.toml"));
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_output_equal_to_input_rejected() {
        let settings = Settings::new("./site", "site");
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("output_dir cannot be the input"));
    }

    #[test]
    fn test_paths_and_urls() {
        let settings = Settings::new("site", "out");

        assert_eq!(
            settings.style_path("btn"),
            PathBuf::from("out/style/btn.css")
        );
        assert_eq!(
            settings.script_path("btn"),
            PathBuf::from("out/script/btn.js")
        );
        assert_eq!(
            settings.output_url(Path::new("out/style/btn.css"), 0),
            "style/btn.css"
        );
        assert_eq!(
            settings.output_url(Path::new("out/script/btn.min.js"), 1),
            "../script/btn.min.js"
        );
    }

    #[test]
    fn test_tags() {
        let settings = Settings::default();

        assert_eq!(
            settings.style_tag("style/a.css"),
            r#"<link rel="stylesheet" href="style/a.css">"#
        );
        assert_eq!(
            settings.script_tag("script/a.js", true, ModuleKind::Classic),
            r#"<script defer type="text/javascript" src="script/a.js"></script>"#
        );
        assert_eq!(
            settings.script_tag("script/a.js", false, ModuleKind::EsModule),
            r#"<script type="module" src="script/a.js"></script>"#
        );
    }
}
