//! Reuse pool for request contexts.
//!
//! Each route owns one pool, so a context handed out for a route always has
//! that route's concrete `Ctx<E>` type. The idle list sits behind a mutex;
//! the lock is held only for a `pop` or a `push`, never while a handler runs.

use std::sync::{Mutex, PoisonError};

use crate::context::{Ctx, Extension};

/// Upper bound on idle contexts kept per route. Contexts released beyond
/// this are dropped.
pub const MAX_IDLE: usize = 256;

pub struct Pool<E: Extension> {
    idle: Mutex<Vec<Ctx<E>>>,
}

impl<E: Extension> Pool<E> {
    pub fn new() -> Self {
        Self { idle: Mutex::new(Vec::new()) }
    }

    /// Hands out an idle context, allocating a new one when none is left.
    /// The caller owns it exclusively until [`release`](Self::release).
    pub fn acquire(&self) -> Ctx<E> {
        self.lock().pop().unwrap_or_default()
    }

    /// Resets `ctx` and returns it to the idle list.
    pub fn release(&self, mut ctx: Ctx<E>) {
        ctx.reset();
        let mut idle = self.lock();
        if idle.len() < MAX_IDLE {
            idle.push(ctx);
        }
    }

    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    // Only reset contexts are ever stored, so a panic while holding the lock
    // cannot leave a half-written entry behind.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Ctx<E>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Extension> Default for Pool<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use http::StatusCode;

    use super::*;
    use crate::context::State;
    use crate::handler::Handler;
    use crate::request::Request;

    #[derive(Default, Debug, PartialEq)]
    struct Counter {
        hits: u32,
    }

    impl Extension for Counter {}

    #[test]
    fn released_context_looks_new() {
        let pool: Pool<Counter> = Pool::new();
        let chain = vec![Handler::new(|ctx: &mut Ctx<Counter>| {
            ctx.hits += 1;
            ctx.response_mut().write_header(StatusCode::IM_A_TEAPOT);
        })]
        .into();

        let mut ctx = pool.acquire();
        ctx.init(chain, http::Request::get("/brew?x=1").body(bytes::Bytes::new()).unwrap().into());
        ctx.start();
        ctx.finish();
        assert_eq!(ctx.hits, 1);
        pool.release(ctx);
        assert_eq!(pool.idle(), 1);

        let ctx = pool.acquire();
        let fresh: Ctx<Counter> = Ctx::new();
        assert_eq!(pool.idle(), 0);
        assert_eq!(ctx.state(), fresh.state());
        assert_eq!(ctx.cursor(), fresh.cursor());
        assert_eq!(ctx.ext(), fresh.ext());
        assert_eq!(ctx.request().uri(), fresh.request().uri());
        assert!(ctx.request().body().is_empty());
        assert_eq!(ctx.response().status(), None);
        assert!(!ctx.response().is_responded());
        assert_eq!(ctx.state(), State::Idle);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool: Pool<()> = Pool::new();
        for _ in 0..MAX_IDLE + 10 {
            pool.release(Ctx::new());
        }
        assert_eq!(pool.idle(), MAX_IDLE);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool: Arc<Pool<Counter>> = Arc::new(Pool::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let mut ctx = pool.acquire();
                        assert_eq!(ctx.hits, 0);
                        ctx.hits += 1;
                        ctx.init(vec![].into(), Request::default());
                        pool.release(ctx);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
