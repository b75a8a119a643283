use crate::routes::{PathMatch, PathPattern, Route};

/// Ordered route table: resolution walks entries in registration order and
/// the first matching pattern wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct Router {
    routes: Vec<(PathPattern, Route)>,
}

/// A resolved route, borrowing the table.
#[derive(Debug)]
pub(crate) struct Resolved<'a> {
    /// The pattern text that matched.
    pub(crate) pattern: &'a str,
    /// Extracted params and splats.
    pub(crate) matched: PathMatch,
    /// The composed handler chain.
    pub(crate) route: &'a Route,
}

impl Router {
    /// Append a route. Later entries never shadow earlier ones.
    pub(crate) fn push(&mut self, pattern: PathPattern, route: Route) {
        self.routes.push((pattern, route));
    }

    /// Resolve a concrete path to the first matching route.
    pub(crate) fn resolve(&self, path: &str) -> Option<Resolved<'_>> {
        self.routes.iter().find_map(|(pattern, route)| {
            pattern.matches(path).map(|matched| Resolved {
                pattern: pattern.as_str(),
                matched,
                route,
            })
        })
    }
}
