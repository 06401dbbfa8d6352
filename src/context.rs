//! The per-request context and the chain-execution state machine.
//!
//! ```text
//!            init            cursor == len
//!   Idle ───────────▶ Running ─────────────▶ Completed
//!    ▲                                          │
//!    └──────────────────── reset ◀──────────────┘
//! ```
//!
//! A context is pooled per route: [`Ctx::init`] installs the chain and the
//! request, [`Ctx::start`] runs the first handler, each handler decides
//! whether to call [`Ctx::next`], and [`Ctx::reset`] wipes everything before
//! the context goes back to the pool.
//!
//! `next` is an ordinary, synchronous call. It returns only after every
//! downstream handler has returned, so code placed after it in a middleware
//! runs on the way back out:
//!
//! ```rust
//! use std::time::Instant;
//! use zapi::Context;
//!
//! fn timing(ctx: &mut dyn Context) {
//!     let started = Instant::now();
//!     ctx.next();
//!     let status = ctx.response().status();
//!     tracing::debug!(?status, elapsed = ?started.elapsed(), "handled");
//! }
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::handler::Chain;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Where a context is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Reset, holding no request.
    Idle,
    /// Initialised, handlers remain.
    Running,
    /// The cursor reached the end of the chain; `next` is a no-op.
    Completed,
}

/// What every context offers, independent of its extension type.
///
/// Middleware written against `&mut dyn Context` fits every route.
pub trait Context: Send {
    fn request(&self) -> &Request;

    fn response(&self) -> &ResponseWriter;

    fn response_mut(&mut self) -> &mut ResponseWriter;

    /// The request and the writer at once, for code that reads one while
    /// writing the other.
    fn split_mut(&mut self) -> (&Request, &mut ResponseWriter);

    /// Runs the next handler of the chain, if any.
    fn next(&mut self);

    /// Index of the next handler to run.
    fn cursor(&self) -> usize;

    fn state(&self) -> State;
}

/// Per-route state carried alongside the base context fields.
///
/// Routes that need nothing extra use `()`. A route registered with
/// `Ctx<Session>` gets a `Session` reachable through the context's
/// `Deref`, and its handlers may be written against `&mut Ctx<Session>`.
///
/// ```rust
/// use zapi::{Ctx, Extension};
///
/// #[derive(Default)]
/// struct Session {
///     user: Option<String>,
/// }
///
/// impl Extension for Session {}
///
/// fn auth(ctx: &mut Ctx<Session>) {
///     ctx.user = ctx.request().header("x-user").map(str::to_owned);
///     ctx.next();
/// }
/// ```
pub trait Extension: Default + Send + 'static {
    /// Runs once after the top-level chain call returns, however many
    /// handlers actually ran.
    fn finish(_ctx: &mut Ctx<Self>) {}

    /// Returns the extension to its zero state before pooling.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Extension for () {}

/// One execution of a route's handler chain.
pub struct Ctx<E: Extension = ()> {
    request: Request,
    response: ResponseWriter,
    chain: Option<Chain<E>>,
    cursor: usize,
    ext: E,
}

impl<E: Extension> Ctx<E> {
    /// A fresh, idle context.
    pub fn new() -> Self {
        Self {
            request: Request::default(),
            response: ResponseWriter::new(),
            chain: None,
            cursor: 0,
            ext: E::default(),
        }
    }

    /// Installs `chain` and `request`. Every other field is reset first, so
    /// a recycled context starts out exactly like a new one.
    pub fn init(&mut self, chain: Chain<E>, request: Request) {
        self.reset();
        self.chain = Some(chain);
        self.request = request;
    }

    /// Runs the first handler. Has no effect on an idle context or one whose
    /// chain already started.
    pub fn start(&mut self) {
        if self.cursor == 0 {
            self.next();
        }
    }

    /// Runs `handler[cursor]` after advancing the cursor. A no-op once the
    /// chain is exhausted.
    pub fn next(&mut self) {
        let Some(handler) = self.chain.as_ref().and_then(|c| c.get(self.cursor)).cloned() else {
            return;
        };
        self.cursor += 1;
        handler.call(self);
    }

    /// Teardown hook, see [`Extension::finish`].
    pub fn finish(&mut self) {
        E::finish(self);
    }

    /// Clears every field to its zero state.
    pub fn reset(&mut self) {
        self.request = Request::default();
        self.response.reset();
        self.chain = None;
        self.cursor = 0;
        self.ext.reset();
    }

    /// Moves the response out, leaving an empty writer behind.
    pub fn take_response(&mut self) -> ResponseWriter {
        std::mem::take(&mut self.response)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub fn chain(&self) -> Option<&Chain<E>> {
        self.chain.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> State {
        match &self.chain {
            None => State::Idle,
            Some(chain) if self.cursor < chain.len() => State::Running,
            Some(_) => State::Completed,
        }
    }

    pub fn ext(&self) -> &E {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut E {
        &mut self.ext
    }
}

impl<E: Extension> Default for Ctx<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Extension> Context for Ctx<E> {
    fn request(&self) -> &Request {
        &self.request
    }

    fn response(&self) -> &ResponseWriter {
        &self.response
    }

    fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    fn split_mut(&mut self) -> (&Request, &mut ResponseWriter) {
        (&self.request, &mut self.response)
    }

    fn next(&mut self) {
        Ctx::next(self)
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn state(&self) -> State {
        Ctx::state(self)
    }
}

impl<E: Extension> Deref for Ctx<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.ext
    }
}

impl<E: Extension> DerefMut for Ctx<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.ext
    }
}

impl<E: Extension> fmt::Debug for Ctx<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("chain", &self.chain)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
