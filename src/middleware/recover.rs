use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::Middleware;

/// Catches a panic from any later handler, logs it and writes
/// `500 Internal Server Error`.
///
/// The write goes through the write-once response, so if a downstream
/// handler already committed a status that status stands and only the log
/// line records the failure.
pub fn recover() -> Middleware {
    Middleware::any(recover_panic).named("recover")
}

fn recover_panic(ctx: &mut dyn Context) {
    let Err(panic) = catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
        return;
    };
    let req = ctx.request();
    error!(
        method = %req.method(),
        path = %req.path(),
        panic = panic_message(panic.as_ref()),
        "handler panicked",
    );
    ctx.response_mut().write_header(StatusCode::INTERNAL_SERVER_ERROR);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Ctx;
    use crate::handler::Handler;
    use crate::request::Request;

    fn run(terminal: Handler) -> Ctx {
        let recover = recover().resolve::<()>().unwrap();
        let mut ctx: Ctx = Ctx::new();
        ctx.init(vec![recover, terminal].into(), Request::default());
        ctx.start();
        ctx
    }

    #[test]
    fn panic_becomes_500() {
        let ctx = run(Handler::new(|_: &mut Ctx| panic!("boom")));
        assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn earlier_status_survives_a_later_panic() {
        let ctx = run(Handler::new(|ctx: &mut Ctx| {
            ctx.response_mut().write(b"partial");
            panic!("after writing");
        }));
        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert_eq!(ctx.response().body(), b"partial");
    }

    #[test]
    fn quiet_chain_is_untouched() {
        let ctx = run(Handler::new(|ctx: &mut Ctx| {
            ctx.response_mut().write_header(StatusCode::ACCEPTED);
        }));
        assert_eq!(ctx.response().status(), Some(StatusCode::ACCEPTED));
    }

    #[test]
    fn extracts_panic_messages() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
