// Copyright 2025 Felipe Torres González
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

//! Panic isolation for the processing of updates.
//!
//! # Description
//!
//! Handlers report their errors using `Result`. This module is the last resort for faults nobody expected:
//! a panic inside the wrapped future is caught, logged along with the stack trace of the panic and the
//! name of the service, and then it is either swallowed ([recover]) or returned as an error
//! ([try_recover]).
//!
//! The stack trace is captured by a panic hook ([install_panic_hook]) at the point of the panic, and handed
//! over to the wrapper through a thread local. Unwinding happens in the same thread that runs the poll of the
//! wrapped future, so the wrapper always finds the trace of its own panic.
//!
//! Panics out of a wrapper (a detached task, a library thread) are logged at error level by the hook itself,
//! which then hands over to the previous hook.

use futures::FutureExt;
use std::{
    any::Any,
    backtrace::Backtrace,
    cell::{Cell, RefCell},
    future::{Future, poll_fn},
    panic::{self, AssertUnwindSafe},
};
use thiserror::Error;
use tracing::error;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
    /// Number of wrapped futures being polled by this thread.
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as polling a wrapped future. Unwinding drops the guard as well.
struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> Self {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        ScopeGuard
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn in_recovery_scope() -> bool {
    SCOPE_DEPTH.with(|depth| depth.get() > 0)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{service} panicked: {message}")]
pub struct Panicked {
    pub service: String,
    pub message: String,
}

/// Install a panic hook that keeps the stack trace of the last panic of each thread.
///
/// # Description
///
/// Panics within [recover] or [try_recover] only leave their trace for the wrapper, which emits the error
/// event. Any other panic is logged at error level here, and then the previous hook runs.
pub fn install_panic_hook() {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let trace = Backtrace::force_capture().to_string();

        if in_recovery_scope() {
            tracing::debug!("Panic detected: {info}");
            LAST_BACKTRACE.with(|last| *last.borrow_mut() = Some(trace));
        } else {
            error!("Unrecovered panic: {info}\n{trace}");
            previous_hook(info);
        }
    }));
}

/// Run `fut`, logging and swallowing any panic.
pub async fn recover<F>(service: &str, fut: F)
where
    F: Future<Output = ()>,
{
    let _ = try_recover(service, fut).await;
}

/// Run `fut`, turning a panic into a [Panicked] error.
pub async fn try_recover<F, T>(service: &str, fut: F) -> Result<T, Panicked>
where
    F: Future<Output = T>,
{
    let mut fut = Box::pin(fut);
    let scoped = poll_fn(move |cx| {
        let _scope = ScopeGuard::enter();
        fut.as_mut().poll(cx)
    });

    match AssertUnwindSafe(scoped).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let trace = LAST_BACKTRACE
                .with(|last| last.borrow_mut().take())
                .unwrap_or_else(|| String::from("<stack trace not captured>"));

            error!(service, panic = %message, "Recovered from a panic\n{trace}");

            Err(Panicked {
                service: service.to_owned(),
                message,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn output_passes_through() {
        assert_eq!(try_recover("test", async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn panic_becomes_an_error() {
        let result: Result<(), Panicked> = try_recover("test", async {
            panic!("handler exploded");
        })
        .await;

        assert_eq!(
            result,
            Err(Panicked {
                service: "test".to_owned(),
                message: "handler exploded".to_owned(),
            })
        );
    }

    #[tokio::test]
    async fn formatted_panics_keep_their_message() {
        let id = 7;
        let result: Result<(), Panicked> = try_recover("test", async move {
            panic!("missing entry {id}");
        })
        .await;

        assert_eq!(result.unwrap_err().message, "missing entry 7");
    }

    #[tokio::test]
    async fn scope_only_covers_the_wrapped_future() {
        assert!(!in_recovery_scope());
        assert_eq!(try_recover("test", async { in_recovery_scope() }).await, Ok(true));
        assert!(!in_recovery_scope());

        let _ = try_recover("test", async {
            tokio::task::yield_now().await;
            panic!("handler exploded");
        })
        .await;
        assert!(!in_recovery_scope());
    }

    #[tokio::test]
    async fn nested_scopes_unwind_to_the_outer_one() {
        let outer = try_recover("outer", async {
            let inner: Result<(), Panicked> = try_recover("inner", async {
                panic!("inner exploded");
            })
            .await;
            (inner.is_err(), in_recovery_scope())
        })
        .await;

        assert_eq!(outer, Ok((true, true)));
        assert!(!in_recovery_scope());
    }

    #[tokio::test]
    async fn recover_returns_normally() {
        recover("test", async {
            let v: Vec<u8> = Vec::new();
            let _ = v[3];
        })
        .await;
    }
}
