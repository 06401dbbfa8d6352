//! Route registration and the one-time table build.
//!
//! Registration only records things. [`Router::build`] does the work: it
//! checks names and `(path, method)` pairs for collisions, loads every
//! pattern into the matcher, merges prefix middleware into each route's
//! chain and derives each route's allowed-method set. The resulting
//! [`App`] is immutable and shared by every request.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::info;

use crate::app::App;
use crate::context::Extension;
use crate::error::Error;
use crate::handler::Middleware;
use crate::matcher::Matcher;
use crate::method::MethodSet;
use crate::route::{Route, Serve};

/// The application router.
///
/// ```rust
/// use zapi::{Context, Ctx, Middleware, Response, Route, Router};
///
/// fn logger(ctx: &mut dyn Context) {
///     ctx.next();
/// }
///
/// fn auth(ctx: &mut dyn Context) {
///     ctx.next();
/// }
///
/// fn pong(ctx: &mut Ctx) {
///     ctx.response_mut().send(Response::text("pong"));
/// }
///
/// let app = Router::new()
///     .group("/api", |api| {
///         api.middleware(Middleware::any(logger))
///             .group("/v1", |v1| {
///                 v1.middleware(Middleware::any(auth))
///                     .route(Route::get("/ping", pong));
///             });
///     })
///     .build()
///     .unwrap();
///
/// // logger, auth, pong
/// assert_eq!(app.routes().next().unwrap().chain.len(), 3);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Box<dyn Serve>>,
    prefixes: BTreeMap<String, Vec<Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// A router whose root prefix starts out with `middleware`, e.g.
    /// [`middleware::defaults()`](crate::middleware::defaults) or
    /// [`Config::middleware`](crate::Config::middleware).
    pub fn with_middleware(middleware: impl IntoIterator<Item = Middleware>) -> Self {
        let mut router = Self::new();
        for mw in middleware {
            router.add_middleware("", mw);
        }
        router
    }

    /// Appends middleware that applies to every route.
    pub fn middleware(mut self, middleware: impl Into<Middleware>) -> Self {
        self.add_middleware("", middleware.into());
        self
    }

    pub fn route<E: Extension>(mut self, route: Route<E>) -> Self {
        self.routes.push(route.into_entry(""));
        self
    }

    /// Registers routes and middleware under `prefix`.
    pub fn group(mut self, prefix: &str, f: impl FnOnce(&mut Group<'_>)) -> Self {
        f(&mut Group { router: &mut self, prefix: prefix.to_owned() });
        self
    }

    fn add_middleware(&mut self, prefix: &str, middleware: Middleware) {
        // "/" prefixes every path, same as the root.
        let prefix = if prefix == "/" { "" } else { prefix };
        self.prefixes.entry(prefix.to_owned()).or_default().push(middleware);
    }

    /// Validates the registrations and produces the servable [`App`].
    ///
    /// Fails on a route without a handler, a duplicate name, two routes
    /// accepting the same method on the same full path (a route without
    /// methods overlaps every method), a middleware bound to another
    /// context type, or a pattern the matcher rejects.
    pub fn build(self) -> Result<App, Error> {
        let Router { mut routes, prefixes } = self;

        check_collisions(&routes)?;

        let mut matcher = Matcher::new();
        for (index, route) in routes.iter().enumerate() {
            let info = route.info();
            matcher.insert(&info.full_path, info.methods, index)
                .map_err(|source| Error::InvalidPath { path: info.full_path.clone(), source })?;
        }

        // Outer groups first: shorter prefixes, ties broken lexically.
        let mut ordered: Vec<(&str, &[Middleware])> = prefixes.iter()
            .map(|(prefix, mws)| (prefix.as_str(), mws.as_slice()))
            .collect();
        ordered.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(b.0)));

        for route in &mut routes {
            route.build(&ordered)?;
            let allowed = matcher.methods_at(&route.info().full_path);
            route.info_mut().allowed = allowed;
        }

        info!(routes = routes.len(), groups = ordered.len(), "route table built");
        Ok(App::new(routes, matcher))
    }
}

fn check_collisions(routes: &[Box<dyn Serve>]) -> Result<(), Error> {
    let mut names = HashSet::new();
    let mut paths: HashMap<&str, Vec<MethodSet>> = HashMap::new();

    for route in routes {
        let info = route.info();

        // Paths first: an unnamed duplicate also duplicates its generated name.
        let seen = paths.entry(info.full_path.as_str()).or_default();
        for earlier in seen.iter() {
            if let Some(method) = earlier.overlap(info.methods) {
                return Err(Error::DuplicateRoute {
                    path: info.full_path.clone(),
                    method: method.map_or_else(|| "*".to_owned(), |m| m.to_string()),
                });
            }
        }
        seen.push(info.methods);

        if !names.insert(info.name.as_str()) {
            return Err(Error::DuplicateName { name: info.name.clone() });
        }
    }
    Ok(())
}

/// Registration scope for routes sharing a path prefix.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
}

impl Group<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends middleware that applies to every route whose full path starts
    /// with this group's prefix, including routes registered elsewhere.
    pub fn middleware(&mut self, middleware: impl Into<Middleware>) -> &mut Self {
        self.router.add_middleware(&self.prefix, middleware.into());
        self
    }

    pub fn route<E: Extension>(&mut self, route: Route<E>) -> &mut Self {
        self.router.routes.push(route.into_entry(&self.prefix));
        self
    }

    /// A nested group; prefixes concatenate.
    pub fn group(&mut self, prefix: &str, f: impl FnOnce(&mut Group<'_>)) -> &mut Self {
        let prefix = format!("{}{prefix}", self.prefix);
        f(&mut Group { router: &mut *self.router, prefix });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Ctx};
    use crate::handler::Handler;
    use crate::method::Method;

    fn noop(ctx: &mut dyn Context) {
        ctx.next();
    }

    fn pong(_: &mut Ctx) {}

    fn named(name: &'static str) -> Middleware {
        Middleware::any(noop).named(name)
    }

    fn chain_of(app: &App, name: &str) -> Vec<&'static str> {
        app.route(name).unwrap().chain.iter()
            .map(|&n| n.rsplit("::").next().unwrap_or(n))
            .collect()
    }

    #[test]
    fn prefix_middleware_runs_outer_to_inner() {
        // Inner group registered first on purpose.
        let app = Router::new()
            .group("/api/v1", |v1| {
                v1.middleware(named("auth"));
            })
            .group("/api", |api| {
                api.middleware(named("logger"))
                    .route(Route::get("/v1/ping", pong).name("ping"));
            })
            .build()
            .unwrap();

        assert_eq!(chain_of(&app, "ping"), ["logger", "auth", "pong"]);
    }

    #[test]
    fn root_middleware_applies_everywhere_and_route_middleware_comes_last() {
        let app = Router::with_middleware([named("recover")])
            .middleware(named("root"))
            .group("/", |g| {
                g.middleware(named("slash"));
            })
            .route(
                Route::get("/x", pong)
                    .name("x")
                    .with(Handler::any(noop).named("route-mw")),
            )
            .build()
            .unwrap();

        assert_eq!(chain_of(&app, "x"), ["recover", "root", "slash", "route-mw", "pong"]);
    }

    #[test]
    fn unrelated_prefix_does_not_apply() {
        let app = Router::new()
            .group("/admin", |g| {
                g.middleware(named("admin"));
            })
            .route(Route::get("/public", pong).name("public"))
            .build()
            .unwrap();

        assert_eq!(chain_of(&app, "public"), ["pong"]);
    }

    #[test]
    fn wildcard_route_collides_with_declared_method() {
        let err = Router::new()
            .route(Route::get("/x", pong))
            .route(Route::any("/x", pong))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { ref path, ref method } if path == "/x" && method == "GET"));
    }

    #[test]
    fn two_wildcards_collide() {
        let err = Router::new()
            .route(Route::any("/x", pong).name("a"))
            .route(Route::any("/x", pong).name("b"))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { ref method, .. } if method == "*"));
    }

    #[test]
    fn disjoint_methods_share_a_path() {
        let app = Router::new()
            .route(Route::get("/x", pong).name("read"))
            .route(Route::new("/x").methods([Method::Post, Method::Put]).name("write").handler(Handler::new(pong)))
            .build()
            .unwrap();

        let allowed = [Method::Get, Method::Post, Method::Put].into_iter().collect();
        assert_eq!(app.route("read").unwrap().allowed, allowed);
        assert_eq!(app.route("write").unwrap().allowed, allowed);
    }

    #[test]
    fn group_prefix_participates_in_collisions() {
        let err = Router::new()
            .group("/api", |g| {
                g.route(Route::get("/x", pong).name("grouped"));
            })
            .route(Route::get("/api/x", pong).name("flat"))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { ref path, .. } if path == "/api/x"));
    }

    #[test]
    fn duplicate_names_fail() {
        let err = Router::new()
            .route(Route::get("/a", pong).name("same"))
            .route(Route::get("/b", pong).name("same"))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateName { ref name } if name == "same"));
    }

    #[test]
    fn route_without_handler_fails() {
        let err = Router::new()
            .route(Route::<()>::new("/empty").name("empty"))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::MissingHandler { ref route } if route == "empty"));
    }

    #[derive(Default)]
    struct Session;

    impl Extension for Session {}

    #[test]
    fn middleware_for_another_context_fails() {
        let session_only: Middleware = Handler::new(|ctx: &mut Ctx<Session>| ctx.next()).into();

        let err = Router::new()
            .group("/app", |g| {
                g.middleware(session_only);
            })
            .route(Route::get("/app/home", pong).name("home"))
            .build()
            .unwrap_err();

        match err {
            Error::IncompatibleHandler { route, expected, found } => {
                assert_eq!(route, "home");
                assert!(found.contains("Session"), "{found}");
                assert!(!expected.contains("Session"), "{expected}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn typed_middleware_fits_its_own_context() {
        let session_only: Middleware = Handler::new(|ctx: &mut Ctx<Session>| ctx.next()).into();

        let app = Router::new()
            .group("/app", |g| {
                g.middleware(session_only)
                    .route(Route::get("/home", |_: &mut Ctx<Session>| {}).name("home"));
            })
            .build()
            .unwrap();

        assert_eq!(app.route("home").unwrap().chain.len(), 2);
    }

    #[test]
    fn unnamed_routes_get_generated_names() {
        let app = Router::new()
            .route(Route::get("/a", pong))
            .route(Route::any("/b", pong))
            .build()
            .unwrap();

        assert!(app.route("GET /a").is_some());
        assert!(app.route("* /b").is_some());
    }

    #[test]
    fn malformed_patterns_fail() {
        let err = Router::new()
            .route(Route::get("/files/{name}", pong))
            .route(Route::get("/files/{*rest}/meta", pong))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPath { ref path, .. } if path == "/files/{*rest}/meta"));
    }

    #[test]
    fn unnamed_duplicates_report_the_route_not_the_name() {
        let err = Router::new()
            .route(Route::get("/x", pong))
            .route(Route::get("/x", pong))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { ref path, ref method } if path == "/x" && method == "GET"), "{err}");
    }

    #[test]
    fn parameter_route_still_serves_where_a_static_sibling_exists() {
        let app = Router::new()
            .route(Route::get("/users/{id}", pong).name("show"))
            .route(Route::post("/users/me", pong).name("update-me"))
            .build()
            .unwrap();

        let get_post: MethodSet = [Method::Get, Method::Post].into_iter().collect();
        let get: MethodSet = [Method::Get].into_iter().collect();
        assert_eq!(app.route("update-me").unwrap().allowed, get_post);
        assert_eq!(app.route("show").unwrap().allowed, get);
    }

    #[test]
    fn app_debug_lists_routes() {
        let app = Router::new().route(Route::get("/a", pong).name("a")).build().unwrap();
        assert!(format!("{app:?}").contains("full_path: \"/a\""), "{app:?}");
    }
}
