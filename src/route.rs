//! Route registration values and the built, servable form of a route.

use std::any::type_name;

use tracing::debug;

use crate::context::{Ctx, Extension};
use crate::error::Error;
use crate::handler::{Chain, Handler, Middleware};
use crate::method::{Method, MethodSet};
use crate::pool::Pool;
use crate::request::Request;
use crate::response::ResponseWriter;

/// One endpoint, as registered.
///
/// `E` selects the context type the route's handlers run against; every
/// request to this route gets a `Ctx<E>` from the route's own pool.
///
/// ```rust
/// use zapi::{Ctx, Handler, Method, Response, Route};
///
/// fn show(ctx: &mut Ctx) {
///     let id = ctx.request().param("id").unwrap_or("?").to_owned();
///     ctx.response_mut().send(Response::text(id));
/// }
///
/// let short = Route::get("/users/{id}", show);
///
/// let long: Route = Route::new("/users/{id}")
///     .method(Method::Get)
///     .method(Method::Head)
///     .name("user.show")
///     .handler(Handler::new(show));
/// ```
pub struct Route<E: Extension = ()> {
    path: String,
    methods: MethodSet,
    name: Option<String>,
    middleware: Vec<Handler<E>>,
    handler: Option<Handler<E>>,
}

impl<E: Extension> Route<E> {
    /// A route at `path` accepting any method, with no handler yet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: MethodSet::EMPTY,
            name: None,
            middleware: Vec::new(),
            handler: None,
        }
    }

    /// A route at `path` for every method.
    pub fn any<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::new(path).handler(Handler::new(f))
    }

    pub fn get<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::any(path, f).method(Method::Get)
    }

    pub fn post<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::any(path, f).method(Method::Post)
    }

    pub fn put<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::any(path, f).method(Method::Put)
    }

    pub fn patch<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::any(path, f).method(Method::Patch)
    }

    pub fn delete<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self::any(path, f).method(Method::Delete)
    }

    /// Adds an accepted method. A route with no methods accepts all of them.
    pub fn method(mut self, method: Method) -> Self {
        self.methods.insert(method);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        for m in methods {
            self.methods.insert(m);
        }
        self
    }

    /// Sets the unique route name. Unnamed routes are called
    /// `"{methods} {full path}"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends route-level middleware; it runs after every prefix
    /// middleware and before the terminal handler.
    pub fn with(mut self, middleware: Handler<E>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Sets the terminal handler.
    pub fn handler(mut self, handler: Handler<E>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub(crate) fn into_entry(self, prefix: &str) -> Box<dyn Serve> {
        let full_path = format!("{prefix}{}", self.path);
        let name = self.name.unwrap_or_else(|| format!("{} {full_path}", self.methods));
        Box::new(RouteEntry {
            info: RouteInfo {
                name,
                path: self.path,
                full_path,
                methods: self.methods,
                allowed: MethodSet::EMPTY,
                chain: Vec::new(),
            },
            middleware: self.middleware,
            handler: self.handler,
            chain: Vec::new().into(),
            pool: Pool::new(),
        })
    }
}

/// Read-only description of a built route.
#[derive(Clone, Debug)]
pub struct RouteInfo {
    pub name: String,
    /// The path as registered, without its group prefix.
    pub path: String,
    pub full_path: String,
    /// Methods declared on the route; empty means any.
    pub methods: MethodSet,
    /// Methods the whole table accepts at `full_path`; empty means any.
    pub allowed: MethodSet,
    /// Handler names in execution order.
    pub chain: Vec<&'static str>,
}

/// A route after registration, with its context type erased so routes of
/// different context types share one table.
pub(crate) trait Serve: Send + Sync {
    fn info(&self) -> &RouteInfo;

    fn info_mut(&mut self) -> &mut RouteInfo;

    /// Merges `prefixes` (already in application order) with the route's
    /// own middleware and terminal handler.
    fn build(&mut self, prefixes: &[(&str, &[Middleware])]) -> Result<(), Error>;

    /// Runs the chain for one request: acquire, init, start, finish,
    /// release.
    fn serve(&self, request: Request) -> ResponseWriter;
}

struct RouteEntry<E: Extension> {
    info: RouteInfo,
    middleware: Vec<Handler<E>>,
    handler: Option<Handler<E>>,
    chain: Chain<E>,
    pool: Pool<E>,
}

impl<E: Extension> Serve for RouteEntry<E> {
    fn info(&self) -> &RouteInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut RouteInfo {
        &mut self.info
    }

    fn build(&mut self, prefixes: &[(&str, &[Middleware])]) -> Result<(), Error> {
        let Some(terminal) = self.handler.take() else {
            return Err(Error::MissingHandler { route: self.info.name.clone() });
        };

        let mut handlers = Vec::new();
        for (prefix, group) in prefixes {
            if !self.info.full_path.starts_with(prefix) {
                continue;
            }
            for mw in group.iter() {
                let handler = mw.resolve::<E>().map_err(|found| Error::IncompatibleHandler {
                    route: self.info.name.clone(),
                    expected: type_name::<Ctx<E>>(),
                    found,
                })?;
                handlers.push(handler);
            }
        }
        handlers.append(&mut self.middleware);
        handlers.push(terminal);

        self.info.chain = handlers.iter().map(Handler::name).collect();
        self.chain = handlers.into();
        debug!(
            route = %self.info.name,
            path = %self.info.full_path,
            chain = ?self.info.chain,
            "route built",
        );
        Ok(())
    }

    fn serve(&self, request: Request) -> ResponseWriter {
        let mut ctx = self.pool.acquire();
        ctx.init(self.chain.clone(), request);
        ctx.start();
        ctx.finish();
        let response = ctx.take_response();
        self.pool.release(ctx);
        response
    }
}
