//! Template helpers available to pages and components.
//!
//! - `use(name, bags...)` renders a component inline and records the dependency
//! - `props(key, value, ...)` builds a props bag; a bag in key position is merged
//! - `hold(name, bags..., name, bags...)` renders components into a bag for later
//! - `drop(bag, names...)` places held fragments
//! - `var(name, defaults...)` reads a site variable
//! - `embed(link)` inlines fetched content verbatim
//! - `list(values...)` builds a list
//!
//! Typed failures raised here are attached as the `source` of the template
//! error and recovered with [`recover`] once rendering returns.

use std::{collections::BTreeMap, sync::Arc};

use minijinja::{
    Environment, Error, ErrorKind, State, Value, context,
    value::{Enumerator, Object, Rest},
};
use parking_lot::Mutex;
use wed_core::{DependencyForest, GraphError};

use crate::{
    fetch::ContentFetcher,
    registry::{Catalog, static_template},
};

/// Template execution errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A site variable was requested without a default.
    #[error("value \"{0}\" requested but not provided")]
    MissingVariable(String),

    /// Unsupported `import` directive value.
    #[error("invalid import: \"{0}\" not supported")]
    UnknownImport(String),

    /// Malformed or unknown second-pass directive.
    #[error("invalid directive: {0}")]
    InvalidDirective(String),

    /// `embed` could not fetch its content.
    #[error("cannot embed '{link}': {message}")]
    Fetch { link: String, message: String },

    /// A helper was called with arguments it cannot use.
    #[error("{helper}: {message}")]
    InvalidArgument { helper: String, message: String },

    /// Any other template engine failure.
    #[error("{0}")]
    Render(String),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// A typed failure recovered from a template engine error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HelperFailure {
    /// Dependency resolution failed inside `use` or `hold`.
    #[error(transparent)]
    Graph(GraphError),

    /// Anything else.
    #[error(transparent)]
    Template(TemplateError),
}

/// Recover the typed error carried by a template engine error.
#[must_use]
pub fn recover(err: &Error) -> HelperFailure {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(graph) = e.downcast_ref::<GraphError>() {
            return HelperFailure::Graph(graph.clone());
        }
        if let Some(template) = e.downcast_ref::<TemplateError>() {
            return HelperFailure::Template(template.clone());
        }
        current = e.source();
    }
    HelperFailure::Template(TemplateError::Render(err.to_string()))
}

fn helper_error<E>(err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

fn invalid_argument(helper: &str, message: impl Into<String>) -> Error {
    helper_error(TemplateError::InvalidArgument {
        helper: helper.to_string(),
        message: message.into(),
    })
}

/// Props and held fragments handed to a component template as `props`.
#[derive(Debug, Clone, Default)]
pub struct ComponentInfo {
    props: BTreeMap<String, Value>,
    holds: Vec<(String, String)>,
}

impl ComponentInfo {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prop.
    pub fn set_prop(&mut self, key: impl Into<String>, value: Value) {
        self.props.insert(key.into(), value);
    }

    /// Hold a rendered fragment, replacing a previous one with the same name.
    pub fn hold(&mut self, name: impl Into<String>, html: impl Into<String>) {
        let name = name.into();
        let html = html.into();
        match self.holds.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = html,
            None => self.holds.push((name, html)),
        }
    }

    /// Merge another bag into this one; later values win.
    pub fn merge(&mut self, other: &ComponentInfo) {
        for (key, value) in &other.props {
            self.props.insert(key.clone(), value.clone());
        }
        for (name, html) in &other.holds {
            self.hold(name.clone(), html.clone());
        }
    }

    /// Held fragments in holding order, all of them when `names` is empty.
    #[must_use]
    pub fn drop_held(&self, names: &[String]) -> String {
        self.holds
            .iter()
            .filter(|(n, _)| names.is_empty() || names.contains(n))
            .map(|(_, html)| html.as_str())
            .collect()
    }
}

impl Object for ComponentInfo {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        self.props.get(key.as_str()?).cloned()
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.props.keys().map(|k| Value::from(k.as_str())).collect())
    }
}

#[derive(Debug, Default)]
struct Usage {
    forest: DependencyForest,
    calls: BTreeMap<String, usize>,
    rendering: Vec<String>,
}

struct Scope {
    catalog: Arc<Catalog>,
    vars: Arc<BTreeMap<String, serde_json::Value>>,
    fetcher: Arc<dyn ContentFetcher>,
    consumer: String,
    usage: Mutex<Usage>,
}

/// Helper functions bound to one render (a page, or a dynamic component).
///
/// Dependencies recorded by `use` and `hold` accumulate privately and are
/// taken with [`Helpers::take_forest`].
#[derive(Clone)]
pub struct Helpers {
    scope: Arc<Scope>,
}

impl Helpers {
    /// Create helpers recording dependencies on behalf of `consumer`.
    pub fn new(
        catalog: Arc<Catalog>,
        vars: Arc<BTreeMap<String, serde_json::Value>>,
        fetcher: Arc<dyn ContentFetcher>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            scope: Arc::new(Scope {
                catalog,
                vars,
                fetcher,
                consumer: consumer.into(),
                usage: Mutex::new(Usage::default()),
            }),
        }
    }

    /// Register every helper on `env`.
    pub fn install(&self, env: &mut Environment<'static>) {
        let scope = Arc::clone(&self.scope);
        env.add_function(
            "use",
            move |state: &State, name: String, bags: Rest<Value>| -> std::result::Result<Value, Error> {
                let html = scope.use_component(state, &name, &bags)?;
                Ok(Value::from_safe_string(html))
            },
        );

        let scope = Arc::clone(&self.scope);
        env.add_function("hold", move |state: &State, args: Rest<Value>| {
            scope.hold(state, &args)
        });

        let scope = Arc::clone(&self.scope);
        env.add_function("var", move |name: String, defaults: Rest<Value>| {
            scope.var(name, defaults.0)
        });

        let scope = Arc::clone(&self.scope);
        env.add_function("embed", move |link: String| scope.embed(link));

        env.add_function("props", |args: Rest<Value>| props(&args));
        env.add_function("drop", |bag: Value, names: Rest<String>| drop_holds(&bag, &names));
        env.add_function("list", |values: Rest<Value>| Value::from(values.0));
    }

    /// Context for rendering on behalf of this scope.
    #[must_use]
    pub fn context(&self, page: &str, props: ComponentInfo) -> Value {
        context! {
            vars => Value::from_serialize(&*self.scope.vars),
            page => page,
            props => Value::from_object(props),
        }
    }

    /// Take the dependencies recorded so far.
    #[must_use]
    pub fn take_forest(&self) -> DependencyForest {
        std::mem::take(&mut self.scope.usage.lock().forest)
    }
}

impl Scope {
    fn consumer_of(&self, state: &State) -> String {
        let name = state.name();
        name.strip_prefix("wed-static-")
            .or_else(|| name.strip_prefix("wed-dynamic-"))
            .map_or_else(|| self.consumer.clone(), str::to_string)
    }

    fn use_component(
        &self,
        state: &State,
        name: &str,
        bags: &[Value],
    ) -> std::result::Result<String, Error> {
        let consumer = self.consumer_of(state);
        let position = {
            let mut usage = self.usage.lock();
            let calls = usage.calls.entry(consumer.clone()).or_default();
            *calls += 1;
            *calls
        };

        let dependency = DependencyForest::resolve(&*self.catalog, &consumer, position, name)
            .map_err(helper_error)?;

        {
            let mut usage = self.usage.lock();
            usage.forest.push(dependency);
            if let Some(start) = usage.rendering.iter().position(|n| n == name) {
                let names = usage.rendering[start..].to_vec();
                return Err(helper_error(GraphError::CircularDependency { names }));
            }
        }

        let mut info = ComponentInfo::new();
        for bag in bags {
            let other = bag
                .downcast_object_ref::<ComponentInfo>()
                .ok_or_else(|| {
                    invalid_argument("use", format!("expected props, got {}", bag.kind()))
                })?;
            info.merge(other);
        }

        let is_inline = self
            .catalog
            .get(name)
            .is_some_and(|component| component.kind.is_static());
        if !is_inline {
            return Ok(String::new());
        }

        let ctx = context! {
            vars => state.lookup("vars").unwrap_or_default(),
            page => state.lookup("page").unwrap_or_default(),
            props => Value::from_object(info),
        };

        self.usage.lock().rendering.push(name.to_string());
        let rendered = state
            .env()
            .get_template(&static_template(name))
            .and_then(|template| template.render(ctx));
        self.usage.lock().rendering.pop();

        rendered
    }

    fn hold(&self, state: &State, args: &[Value]) -> std::result::Result<Value, Error> {
        let mut bag = ComponentInfo::new();
        let mut pending: Option<(String, Vec<Value>)> = None;

        for arg in args {
            if let Some(name) = arg.as_str() {
                if let Some((held, bags)) = pending.take() {
                    let html = self.use_component(state, &held, &bags)?;
                    bag.hold(held, html);
                }
                pending = Some((name.to_string(), Vec::new()));
            } else if arg.downcast_object_ref::<ComponentInfo>().is_some() {
                match pending.as_mut() {
                    Some((_, bags)) => bags.push(arg.clone()),
                    None => return Err(invalid_argument("hold", "props given before any name")),
                }
            } else {
                return Err(invalid_argument(
                    "hold",
                    format!("expected a component name or props, got {}", arg.kind()),
                ));
            }
        }

        let Some((held, bags)) = pending else {
            return Err(invalid_argument("hold", "at least one component name is required"));
        };
        let html = self.use_component(state, &held, &bags)?;
        bag.hold(held, html);

        Ok(Value::from_object(bag))
    }

    fn var(&self, name: String, mut defaults: Vec<Value>) -> std::result::Result<Value, Error> {
        if let Some(value) = self.vars.get(&name) {
            return Ok(Value::from_serialize(value));
        }
        match defaults.len() {
            0 => Err(helper_error(TemplateError::MissingVariable(name))),
            1 => Ok(defaults.remove(0)),
            _ => Ok(Value::from(defaults)),
        }
    }

    fn embed(&self, link: String) -> std::result::Result<Value, Error> {
        match self.fetcher.fetch(&link) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Value::from_safe_string(text)),
                Err(e) => Err(helper_error(TemplateError::Fetch {
                    link,
                    message: format!("content is not valid UTF-8: {e}"),
                })),
            },
            Err(message) => Err(helper_error(TemplateError::Fetch { link, message })),
        }
    }
}

fn props(args: &[Value]) -> std::result::Result<Value, Error> {
    let mut bag = ComponentInfo::new();
    let mut key: Option<String> = None;

    for arg in args {
        match key.take() {
            Some(k) => bag.set_prop(k, arg.clone()),
            None => match arg.downcast_object_ref::<ComponentInfo>() {
                Some(other) => bag.merge(other),
                None => {
                    key = Some(arg.as_str().map_or_else(|| arg.to_string(), str::to_string));
                }
            },
        }
    }

    if let Some(k) = key {
        return Err(invalid_argument("props", format!("key '{k}' has no value")));
    }
    Ok(Value::from_object(bag))
}

fn drop_holds(bag: &Value, names: &[String]) -> std::result::Result<Value, Error> {
    if bag.is_undefined() || bag.is_none() {
        return Ok(Value::from_safe_string(String::new()));
    }
    let info = bag
        .downcast_object_ref::<ComponentInfo>()
        .ok_or_else(|| invalid_argument("drop", format!("expected props, got {}", bag.kind())))?;
    Ok(Value::from_safe_string(info.drop_held(names)))
}
