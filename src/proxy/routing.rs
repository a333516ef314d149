//! First-match prefix routing.
//!
//! A [`RoutingTable`] holds the configured backends in their configured
//! order plus the fallback backend. [`RoutingTable::resolve`] walks the
//! routes in order and each route's prefixes in order; the first prefix
//! the request path starts with selects the route. Order is significant:
//! an earlier, wider prefix shadows a later, narrower one. Paths that match
//! nothing resolve to the fallback route named [`DEFAULT_ROUTE_NAME`].

use crate::config::model::Config;

/// Name of the synthetic route used when no prefix matches.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// One backend and the path prefixes that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub prefixes: Vec<String>,
    pub port: u16,
}

impl Route {
    #[must_use]
    pub fn new(name: impl Into<String>, prefixes: Vec<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            prefixes,
            port,
        }
    }

    /// The first configured prefix `path` starts with, compared byte-wise.
    #[must_use]
    pub fn matching_prefix(&self, path: &str) -> Option<&str> {
        // `starts_with` checks the length before comparing, so a path shorter
        // than the prefix is a plain mismatch.
        self.prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| path.as_bytes().starts_with(prefix.as_bytes()))
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.prefixes.is_empty() && self.name == DEFAULT_ROUTE_NAME
    }
}

/// Immutable routing table: ordered routes plus the fallback route.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: Vec<Route>,
    fallback: Route,
}

impl RoutingTable {
    #[must_use]
    pub fn new(routes: Vec<Route>, default_port: u16) -> Self {
        Self {
            routes,
            fallback: Route::new(DEFAULT_ROUTE_NAME, Vec::new(), default_port),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let routes = config
            .servers
            .iter()
            .map(|s| Route::new(s.name.clone(), s.path.clone(), s.port))
            .collect();
        Self::new(routes, config.default_port)
    }

    /// Select the backend for `path`. Never fails: no match is the fallback route.
    #[must_use]
    pub fn resolve(&self, path: &str) -> &Route {
        self.routes
            .iter()
            .find(|route| route.matching_prefix(path).is_some())
            .unwrap_or(&self.fallback)
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.fallback.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, prefixes: &[&str], port: u16) -> Route {
        Route::new(
            name,
            prefixes.iter().map(|s| (*s).to_string()).collect(),
            port,
        )
    }

    #[test]
    fn prefix_match() {
        let table = RoutingTable::new(vec![route("svc1", &["/api/v1"], 9001)], 8080);
        let matched = table.resolve("/api/v1/users");
        assert_eq!(matched.name, "svc1");
        assert_eq!(matched.port, 9001);
    }

    #[test]
    fn no_match_falls_back_to_default() {
        let table = RoutingTable::new(vec![route("svc1", &["/api/v1"], 9001)], 8080);
        let matched = table.resolve("/other");
        assert!(matched.is_default());
        assert_eq!(matched.name, "default");
        assert_eq!(matched.port, 8080);
        assert!(matched.prefixes.is_empty());
    }

    #[test]
    fn first_route_wins_on_overlap() {
        let table = RoutingTable::new(
            vec![route("wide", &["/api"], 9001), route("narrow", &["/api/v1"], 9002)],
            8080,
        );
        assert_eq!(table.resolve("/api/v1/users").name, "wide");
    }

    #[test]
    fn narrow_first_is_selected_when_listed_first() {
        let table = RoutingTable::new(
            vec![route("narrow", &["/api/v1"], 9002), route("wide", &["/api"], 9001)],
            8080,
        );
        assert_eq!(table.resolve("/api/v1/users").name, "narrow");
        assert_eq!(table.resolve("/api/v2").name, "wide");
    }

    #[test]
    fn prefix_order_within_route() {
        let r = route("svc", &["/a/b", "/a"], 9001);
        assert_eq!(r.matching_prefix("/a/b/c"), Some("/a/b"));
        assert_eq!(r.matching_prefix("/a/x"), Some("/a"));
    }

    #[test]
    fn path_shorter_than_prefix_does_not_match() {
        let table = RoutingTable::new(vec![route("svc", &["/api/v1/long"], 9001)], 8080);
        assert!(table.resolve("/api").is_default());
        assert!(table.resolve("").is_default());
        assert!(table.resolve("/").is_default());
    }

    #[test]
    fn no_normalization() {
        let table = RoutingTable::new(vec![route("svc", &["/api/"], 9001)], 8080);
        assert!(table.resolve("/api").is_default());
        assert!(table.resolve("/API/x").is_default());
        assert!(table.resolve("//api/x").is_default());
        assert_eq!(table.resolve("/api/x").name, "svc");
    }

    #[test]
    fn prefix_is_not_segment_aware() {
        let table = RoutingTable::new(vec![route("svc", &["/api"], 9001)], 8080);
        assert_eq!(table.resolve("/apiary").name, "svc");
    }

    #[test]
    fn multibyte_paths_compare_bytewise() {
        let table = RoutingTable::new(vec![route("svc", &["/caf\u{e9}"], 9001)], 8080);
        assert_eq!(table.resolve("/caf\u{e9}/menu").name, "svc");
        assert!(table.resolve("/caf").is_default());
    }

    #[test]
    fn empty_table_always_defaults() {
        let table = RoutingTable::new(Vec::new(), 3000);
        assert_eq!(table.resolve("/anything").port, 3000);
        assert_eq!(table.default_port(), 3000);
        assert!(table.routes().is_empty());
    }
}
