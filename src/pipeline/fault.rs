//! Panic interception at the request boundary.
//!
//! A panic inside an operation unwinds into [`isolate`], which turns it into
//! an [`EscapedFault`] instead of letting it tear down the connection task.
//! With [`install_panic_hook`] in place the fault carries the backtrace of
//! the panic site; otherwise the backtrace is taken at the boundary.

use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

struct PanicSite {
    location: Option<String>,
    backtrace: String,
}

/// A panic caught at the request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapedFault {
    /// Dynamic type of the panic payload.
    pub type_name: String,
    pub message: String,
    /// `file:line:col` of the panic, when the hook saw it.
    pub location: Option<String>,
    pub stacktrace: String,
}

impl EscapedFault {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let (type_name, message) = if let Some(s) = payload.downcast_ref::<&'static str>() {
            ("&str", (*s).to_string())
        } else if let Some(s) = payload.downcast_ref::<String>() {
            ("String", s.clone())
        } else {
            ("Box<dyn Any + Send>", "opaque panic payload".to_string())
        };

        let (location, stacktrace) = match LAST_PANIC.with(|slot| slot.borrow_mut().take()) {
            Some(site) => (site.location, site.backtrace),
            None => (None, Backtrace::force_capture().to_string()),
        };

        Self {
            type_name: type_name.to_string(),
            message,
            location,
            stacktrace,
        }
    }
}

impl std::fmt::Display for EscapedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "panic ({}): {}", self.type_name, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

/// Chain a panic hook that records where each panic happened.
///
/// The previous hook still runs. Calling this more than once is a no-op.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                location: info.location().map(|l| l.to_string()),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

/// Drive `future` to completion, converting a panic into an [`EscapedFault`].
pub async fn isolate<F>(future: F) -> Result<F::Output, EscapedFault>
where
    F: Future,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(EscapedFault::from_payload)
}
