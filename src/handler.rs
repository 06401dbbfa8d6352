//! Handler shapes and type erasure.
//!
//! # Two shapes, one call
//!
//! A chain entry is written against one of two parameter types:
//!
//! ```text
//! fn pong(ctx: &mut Ctx<Session>)      ← the route's concrete context
//! fn logger(ctx: &mut dyn Context)     ← any context at all
//! ```
//!
//! Both are adapted once, at registration, into a [`Handler<E>`]. At request
//! time the context calls `handler.call(self)`: one match on a two-variant
//! enum and one vtable call. Nothing inspects types on the hot path.
//!
//! Prefix middleware is registered before the routes it will apply to are
//! known, so it is stored as a context-agnostic [`Middleware`]. Turning it
//! back into a `Handler<E>` for a concrete route happens during
//! [`Router::build`](crate::Router::build), and a middleware written for a
//! different context type fails the build there instead of misbehaving at
//! request time.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::context::{Context, Ctx, Extension};
use crate::request::Request;
use crate::response::ResponseWriter;

type ContextFn<E> = Arc<dyn Fn(&mut Ctx<E>) + Send + Sync + 'static>;
type AnyFn = Arc<dyn Fn(&mut dyn Context) + Send + Sync + 'static>;

enum Kind<E: Extension> {
    Context(ContextFn<E>),
    Any(AnyFn),
}

/// One entry of a handler chain, adapted for contexts of type `Ctx<E>`.
///
/// Cloning is one atomic reference-count increment.
pub struct Handler<E: Extension = ()> {
    kind: Kind<E>,
    name: &'static str,
}

impl<E: Extension> Handler<E> {
    /// Adapts a function over the concrete context type.
    ///
    /// ```rust
    /// use zapi::{Ctx, Handler, Response};
    ///
    /// fn pong(ctx: &mut Ctx) {
    ///     ctx.response_mut().send(Response::text("pong"));
    /// }
    ///
    /// let handler: Handler = Handler::new(pong);
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Ctx<E>) + Send + Sync + 'static,
    {
        Self { kind: Kind::Context(Arc::new(f)), name: type_name::<F>() }
    }

    /// Adapts a function over the generic [`Context`] capability. Such a
    /// handler fits every route regardless of its context type.
    pub fn any<F>(f: F) -> Self
    where
        F: Fn(&mut dyn Context) + Send + Sync + 'static,
    {
        Self { kind: Kind::Any(Arc::new(f)), name: type_name::<F>() }
    }

    /// Adapts a plain `(request, writer)` function. It never calls `next`,
    /// so it only makes sense as a terminal handler.
    pub fn wrap<F>(f: F) -> Self
    where
        F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
    {
        let name = type_name::<F>();
        Self::any(move |ctx: &mut dyn Context| {
            let (req, res) = ctx.split_mut();
            f(req, res);
        })
        .named(name)
    }

    /// Overrides the diagnostic name (defaults to the function's type name).
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn call(&self, ctx: &mut Ctx<E>) {
        match &self.kind {
            Kind::Context(f) => f(ctx),
            Kind::Any(f) => f(ctx as &mut dyn Context),
        }
    }
}

impl<E: Extension> Clone for Handler<E> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            Kind::Context(f) => Kind::Context(Arc::clone(f)),
            Kind::Any(f) => Kind::Any(Arc::clone(f)),
        };
        Self { kind, name: self.name }
    }
}

impl<E: Extension> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// The immutable, fully merged handler sequence of one route:
/// prefix middleware, then route middleware, then the terminal handler.
pub struct Chain<E: Extension = ()>(Arc<[Handler<E>]>);

impl<E: Extension> Chain<E> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Handler<E>> {
        self.0.get(index)
    }

    /// Diagnostic names of every entry, in execution order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(Handler::name)
    }
}

impl<E: Extension> Clone for Chain<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Extension> From<Vec<Handler<E>>> for Chain<E> {
    fn from(handlers: Vec<Handler<E>>) -> Self {
        Self(handlers.into())
    }
}

impl<E: Extension> fmt::Debug for Chain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

enum Erased {
    Any(AnyFn),
    Context {
        context: &'static str,
        // Holds a `ContextFn<E>` for the `E` named by `context`.
        handler: Arc<dyn Any + Send + Sync>,
    },
}

/// A handler registered on a path prefix, not yet bound to a context type.
///
/// Build one from a generic function with [`Middleware::any`], or convert a
/// [`Handler<E>`]; the latter only applies cleanly to routes whose context
/// is `Ctx<E>`.
pub struct Middleware {
    erased: Erased,
    name: &'static str,
}

impl Middleware {
    pub fn any<F>(f: F) -> Self
    where
        F: Fn(&mut dyn Context) + Send + Sync + 'static,
    {
        Handler::<()>::any(f).into()
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Binds this middleware to `Ctx<E>`. On mismatch returns the context
    /// type the middleware was written for.
    pub(crate) fn resolve<E: Extension>(&self) -> Result<Handler<E>, &'static str> {
        let kind = match &self.erased {
            Erased::Any(f) => Kind::Any(Arc::clone(f)),
            Erased::Context { context, handler } => {
                let f = handler.downcast_ref::<ContextFn<E>>().ok_or(*context)?;
                Kind::Context(Arc::clone(f))
            }
        };
        Ok(Handler { kind, name: self.name })
    }
}

impl<E: Extension> From<Handler<E>> for Middleware {
    fn from(handler: Handler<E>) -> Self {
        let erased = match handler.kind {
            Kind::Any(f) => Erased::Any(f),
            Kind::Context(f) => Erased::Context {
                context: type_name::<Ctx<E>>(),
                handler: Arc::new(f),
            },
        };
        Self { erased, name: handler.name }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Session {
        user: Option<String>,
    }

    impl Extension for Session {}

    fn login(ctx: &mut Ctx<Session>) {
        ctx.user = Some("alice".into());
        ctx.next();
    }

    #[test]
    fn generic_middleware_resolves_for_any_context() {
        let mw = Middleware::any(|ctx| ctx.next()).named("pass");
        assert_eq!(mw.resolve::<()>().unwrap().name(), "pass");
        assert_eq!(mw.resolve::<Session>().unwrap().name(), "pass");
    }

    #[test]
    fn typed_middleware_only_resolves_for_its_context() {
        let mw: Middleware = Handler::new(login).into();
        assert!(mw.resolve::<Session>().is_ok());

        let found = mw.resolve::<()>().unwrap_err();
        assert!(found.contains("Session"), "{found}");
    }

    #[test]
    fn default_names_come_from_the_function() {
        let h: Handler<Session> = Handler::new(login);
        assert!(h.name().ends_with("login"), "{}", h.name());
    }

    #[test]
    fn chain_keeps_order() {
        let chain: Chain = vec![
            Handler::any(|_| {}).named("a"),
            Handler::new(|_: &mut Ctx| {}).named("b"),
        ]
        .into();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.names().collect::<Vec<_>>(), ["a", "b"]);
    }
}
