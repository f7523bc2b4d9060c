//! Component dependency graph.
//!
//! Components are kept in an arena keyed by name (anything implementing
//! [`RequireLookup`]); a page's dependency forest only stores root names and
//! every edge is followed by lookup. Walks keep an explicit path so cycles
//! terminate instead of recursing forever.

use std::collections::HashSet;

use rayon::prelude::*;
use thiserror::Error;

/// Dependency graph errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A required component does not exist.
    #[error(
        "on component '{consumer}' trying to require at place {position} non existing component '{missing}'"
    )]
    UnknownDependency {
        consumer: String,
        position: usize,
        missing: String,
    },

    /// Components requiring themselves, directly or transitively.
    #[error("detected circular dependency in: {}", .names.join(", "))]
    CircularDependency { names: Vec<String> },
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Arena access used to follow dependency edges.
pub trait RequireLookup {
    /// Whether a component with this name exists.
    fn contains(&self, name: &str) -> bool;

    /// Names required by the named component, `None` if it does not exist.
    fn requires(&self, name: &str) -> Option<&[String]>;
}

/// A dependency edge from a consumer (page or component) to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Page or component that declared the edge.
    pub consumer: String,

    /// Required component; its own requirements are reached through lookup.
    pub name: String,
}

/// The dependency trees accumulated while composing one page.
#[derive(Debug, Clone, Default)]
pub struct DependencyForest {
    roots: Vec<Dependency>,
}

impl DependencyForest {
    /// Create an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that `name` and everything it requires exists, then build
    /// the edge from `consumer` to it.
    ///
    /// `position` is reported when `name` itself is missing.
    pub fn resolve<L: RequireLookup + ?Sized>(
        lookup: &L,
        consumer: &str,
        position: usize,
        name: &str,
    ) -> Result<Dependency> {
        if !lookup.contains(name) {
            return Err(GraphError::UnknownDependency {
                consumer: consumer.to_string(),
                position,
                missing: name.to_string(),
            });
        }

        let mut seen = HashSet::from([name]);
        let mut stack = vec![name];

        while let Some(current) = stack.pop() {
            let requires = lookup.requires(current).unwrap_or_default();
            for (i, required) in requires.iter().enumerate() {
                if !lookup.contains(required) {
                    return Err(GraphError::UnknownDependency {
                        consumer: current.to_string(),
                        position: i + 1,
                        missing: required.clone(),
                    });
                }
                if seen.insert(required.as_str()) {
                    stack.push(required.as_str());
                }
            }
        }

        Ok(Dependency {
            consumer: consumer.to_string(),
            name: name.to_string(),
        })
    }

    /// Append a resolved edge.
    pub fn push(&mut self, dependency: Dependency) {
        self.roots.push(dependency);
    }

    /// Edges in the order they were recorded.
    #[must_use]
    pub fn roots(&self) -> &[Dependency] {
        &self.roots
    }

    /// Whether no edge was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Names of every component lying on a cycle, without duplicates.
    ///
    /// Each root is checked on its own task; an empty result means the
    /// forest is acyclic.
    pub fn detect_cycle<L: RequireLookup + Sync + ?Sized>(&self, lookup: &L) -> Vec<String> {
        let per_root: Vec<Vec<String>> = self
            .roots
            .par_iter()
            .map(|root| {
                let mut path = Vec::new();
                let mut done = HashSet::new();
                let mut found = Vec::new();
                walk_cycles(lookup, &root.name, &mut path, &mut done, &mut found);
                found
            })
            .collect();

        let mut names: Vec<String> = Vec::new();
        for name in per_root.into_iter().flatten() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Fail with [`GraphError::CircularDependency`] if the forest has a cycle.
    pub fn check_acyclic<L: RequireLookup + Sync + ?Sized>(&self, lookup: &L) -> Result<()> {
        let names = self.detect_cycle(lookup);
        if names.is_empty() {
            Ok(())
        } else {
            Err(GraphError::CircularDependency { names })
        }
    }

    /// Every distinct component of the forest, dependencies first.
    ///
    /// Post-order depth-first walk over the roots in recording order; the
    /// first occurrence of a name decides its place.
    pub fn flatten<L: RequireLookup + ?Sized>(&self, lookup: &L) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for root in &self.roots {
            post_order(lookup, &root.name, &mut visited, &mut order);
        }
        order
    }
}

fn walk_cycles<'a, L: RequireLookup + ?Sized>(
    lookup: &'a L,
    name: &'a str,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
    found: &mut Vec<String>,
) {
    path.push(name);

    for required in lookup.requires(name).unwrap_or_default() {
        if let Some(start) = path.iter().position(|p| *p == required) {
            for member in &path[start..] {
                if !found.iter().any(|f| f == member) {
                    found.push((*member).to_string());
                }
            }
        } else if !done.contains(required.as_str()) {
            walk_cycles(lookup, required, path, done, found);
        }
    }

    path.pop();
    done.insert(name);
}

fn post_order<'a, L: RequireLookup + ?Sized>(
    lookup: &'a L,
    name: &'a str,
    visited: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) {
    if !visited.insert(name) {
        return;
    }
    for required in lookup.requires(name).unwrap_or_default() {
        post_order(lookup, required, visited, order);
    }
    order.push(name.to_string());
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct Arena(HashMap<String, Vec<String>>);

    impl Arena {
        fn with(mut self, name: &str, requires: &[&str]) -> Self {
            self.0.insert(
                name.to_string(),
                requires.iter().map(|r| r.to_string()).collect(),
            );
            self
        }
    }

    impl RequireLookup for Arena {
        fn contains(&self, name: &str) -> bool {
            self.0.contains_key(name)
        }

        fn requires(&self, name: &str) -> Option<&[String]> {
            self.0.get(name).map(Vec::as_slice)
        }
    }

    fn forest(arena: &Arena, roots: &[&str]) -> DependencyForest {
        let mut forest = DependencyForest::new();
        for (i, root) in roots.iter().enumerate() {
            forest.push(DependencyForest::resolve(arena, "index", i + 1, root).unwrap());
        }
        forest
    }

    #[test]
    fn test_resolve_unknown_root() {
        let arena = Arena::default().with("btn", &[]);
        let err = DependencyForest::resolve(&arena, "index", 2, "missing").unwrap_err();

        assert_eq!(
            err,
            GraphError::UnknownDependency {
                consumer: "index".to_string(),
                position: 2,
                missing: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_unknown_nested_requirement() {
        let arena = Arena::default()
            .with("nav", &["link"])
            .with("link", &["icon", "ghost"])
            .with("icon", &[]);
        let err = DependencyForest::resolve(&arena, "index", 1, "nav").unwrap_err();

        assert_eq!(
            err,
            GraphError::UnknownDependency {
                consumer: "link".to_string(),
                position: 2,
                missing: "ghost".to_string(),
            }
        );
        assert!(err.to_string().contains("'ghost'"));
    }

    #[test]
    fn test_resolve_terminates_on_cycle() {
        let arena = Arena::default().with("a", &["b"]).with("b", &["a"]);
        let dep = DependencyForest::resolve(&arena, "index", 1, "a").unwrap();
        assert_eq!(dep.name, "a");
        assert_eq!(dep.consumer, "index");
    }

    #[test]
    fn test_no_cycle_in_diamond() {
        let arena = Arena::default()
            .with("app", &["left", "right"])
            .with("left", &["base"])
            .with("right", &["base"])
            .with("base", &[]);
        let forest = forest(&arena, &["app", "base"]);

        assert!(forest.detect_cycle(&arena).is_empty());
        assert!(forest.check_acyclic(&arena).is_ok());
    }

    #[test]
    fn test_two_node_cycle_names_both() {
        let arena = Arena::default().with("a", &["b"]).with("b", &["a"]);
        let forest = forest(&arena, &["a"]);

        assert_eq!(forest.detect_cycle(&arena), vec!["a", "b"]);
    }

    #[test]
    fn test_self_reference_at_depth() {
        let arena = Arena::default()
            .with("page", &["list"])
            .with("list", &["item"])
            .with("item", &["item"]);
        let forest = forest(&arena, &["page"]);

        let names = forest.detect_cycle(&arena);
        assert_eq!(names, vec!["item"]);

        let err = forest.check_acyclic(&arena).unwrap_err();
        assert_eq!(err.to_string(), "detected circular dependency in: item");
    }

    #[test]
    fn test_cycle_merge_without_duplicates() {
        let arena = Arena::default()
            .with("a", &["b"])
            .with("b", &["c"])
            .with("c", &["a"]);
        let forest = forest(&arena, &["a", "b", "c", "a"]);

        let mut names = forest.detect_cycle(&arena);
        assert_eq!(names.len(), 3);
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_flatten_dependencies_first() {
        let arena = Arena::default()
            .with("app", &["left", "right"])
            .with("left", &["base"])
            .with("right", &["base", "icon"])
            .with("base", &[])
            .with("icon", &[]);
        let forest = forest(&arena, &["app", "icon", "base"]);

        let order = forest.flatten(&arena);
        assert_eq!(order, vec!["base", "left", "icon", "right", "app"]);
    }

    #[test]
    fn test_flatten_unique_and_ordered() {
        let arena = Arena::default()
            .with("a", &["c"])
            .with("b", &["c"])
            .with("c", &[]);
        let forest = forest(&arena, &["a", "b", "a", "c"]);

        let order = forest.flatten(&arena);
        assert_eq!(order, vec!["c", "a", "b"]);

        let position = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(position("c") < position("a"));
        assert!(position("c") < position("b"));
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let arena = Arena::default()
            .with("x", &["y", "z"])
            .with("y", &[])
            .with("z", &["y"]);
        let forest = forest(&arena, &["x"]);

        let first = forest.flatten(&arena);
        for _ in 0..10 {
            assert_eq!(forest.flatten(&arena), first);
        }
    }
}
