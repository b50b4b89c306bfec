//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Look up the first route whose matcher accepts the uri
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - O(n) scan; first match wins, no specificity ranking
//! - An ordered `Vec` of pairs, never a map keyed by pattern

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::http::{Request, Response};
use crate::routing::matcher::{Matcher, RegexMatcher};

/// Future returned by a route handler.
pub type HandlerFuture = BoxFuture<'static, Response>;

/// An asynchronous request handler.
pub type Handler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Wrap an async function or closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// Error building a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A (pattern, handler) pair.
pub struct Route {
    matcher: Box<dyn Matcher>,
    handler: Handler,
}

impl Route {
    /// Compile `pattern` as a regular expression.
    pub fn new(pattern: &str, handler: Handler) -> Result<Self, RouteError> {
        let matcher = RegexMatcher::new(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::with_matcher(matcher, handler))
    }

    /// Use an already-built matcher.
    pub fn with_matcher(matcher: impl Matcher + 'static, handler: Handler) -> Self {
        Self {
            matcher: Box::new(matcher),
            handler,
        }
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.matcher.matches(uri)
    }

    pub fn pattern(&self) -> String {
        self.matcher.describe()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Ordered routing table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Append a route; it is consulted after every route added before it.
    pub fn route(mut self, pattern: &str, handler: Handler) -> Result<Self, RouteError> {
        self.routes.push(Route::new(pattern, handler)?);
        Ok(self)
    }

    /// First route in registration order that matches `uri`.
    pub fn match_uri(&self, uri: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(uri))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> Handler {
        handler_fn(move |_req| async move { Response::new().with_header("X-Route", tag) })
    }

    #[test]
    fn first_registered_route_wins() {
        let router = Router::default()
            .route("^/x$", tagged("r1"))
            .unwrap()
            .route("^/x", tagged("r2"))
            .unwrap();

        for _ in 0..10 {
            let route = router.match_uri("/x").unwrap();
            assert_eq!(route.pattern(), "^/x$");
        }
        assert_eq!(router.match_uri("/xy").unwrap().pattern(), "^/x");
    }

    #[test]
    fn root_and_color_routes_do_not_overlap() {
        let router = Router::default()
            .route("^/$", tagged("root"))
            .unwrap()
            .route(r"(?i)^/\?color=[a-f0-9]*$", tagged("color"))
            .unwrap();

        assert_eq!(router.match_uri("/").unwrap().pattern(), "^/$");
        assert_eq!(
            router.match_uri("/?color=A1B2C3").unwrap().pattern(),
            r"(?i)^/\?color=[a-f0-9]*$"
        );
        assert!(router.match_uri("/favicon.ico").is_none());
    }

    #[test]
    fn empty_router_matches_nothing() {
        let router = Router::default();
        assert!(router.is_empty());
        assert!(router.match_uri("/").is_none());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Router::default().route("[", tagged("bad")).unwrap_err();
        assert!(err.to_string().contains("Invalid route pattern"));
    }
}
