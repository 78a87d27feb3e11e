//! Relays native error events to the application's presentation layer.
//!
//! The relay never fails: a presenter that panics is contained and logged.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::identifiers::SessionId;

// ============================================================================
// ErrorNotice
// ============================================================================

/// An error reported by the native layer, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    /// Session that reported the error.
    pub session_id: SessionId,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// ErrorPresenter
// ============================================================================

/// Presentation hook for native errors (toast, banner, dialog...).
///
/// Closures `Fn(&ErrorNotice)` implement this trait.
pub trait ErrorPresenter: Send + Sync {
    /// Shows the notice with a way for the user to dismiss it.
    fn present(&self, notice: &ErrorNotice);

    /// Hides the notice currently shown.
    fn dismiss(&self) {}
}

impl<F> ErrorPresenter for F
where
    F: Fn(&ErrorNotice) + Send + Sync,
{
    fn present(&self, notice: &ErrorNotice) {
        self(notice)
    }
}

/// Presenter that writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl ErrorPresenter for LogPresenter {
    fn present(&self, notice: &ErrorNotice) {
        warn!(session_id = %notice.session_id, message = %notice.message, "AR session error");
    }
}

// ============================================================================
// ErrorRelay
// ============================================================================

/// Holds the notice currently shown and forwards to the presenter.
pub struct ErrorRelay {
    session_id: SessionId,
    presenter: Arc<dyn ErrorPresenter>,
    current: Mutex<Option<ErrorNotice>>,
}

impl fmt::Debug for ErrorRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRelay")
            .field("session_id", &self.session_id)
            .field("current", &*self.current.lock())
            .finish_non_exhaustive()
    }
}

impl ErrorRelay {
    /// Creates a relay for one session.
    #[must_use]
    pub fn new(session_id: SessionId, presenter: Arc<dyn ErrorPresenter>) -> Self {
        Self {
            session_id,
            presenter,
            current: Mutex::new(None),
        }
    }

    /// Presents a native error message.
    ///
    /// A newer notice replaces the one shown.
    pub fn relay(&self, message: impl Into<String>) {
        let notice = ErrorNotice {
            session_id: self.session_id,
            message: message.into(),
        };

        *self.current.lock() = Some(notice.clone());

        let presenter = &self.presenter;
        if catch_unwind(AssertUnwindSafe(|| presenter.present(&notice))).is_err() {
            error!(session_id = %self.session_id, "Error presenter panicked");
        }
    }

    /// Returns the notice currently shown.
    #[must_use]
    pub fn current(&self) -> Option<ErrorNotice> {
        self.current.lock().clone()
    }

    /// Dismisses the notice currently shown. No-op if nothing is shown.
    pub fn dismiss(&self) {
        if self.current.lock().take().is_none() {
            return;
        }

        let presenter = &self.presenter;
        if catch_unwind(AssertUnwindSafe(|| presenter.dismiss())).is_err() {
            error!(session_id = %self.session_id, "Error presenter panicked on dismiss");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> SessionId {
        SessionId::from_u32(1).expect("non-zero")
    }

    #[derive(Default)]
    struct Counting {
        presented: Mutex<Vec<String>>,
        dismissed: AtomicUsize,
    }

    impl ErrorPresenter for Counting {
        fn present(&self, notice: &ErrorNotice) {
            self.presented.lock().push(notice.message.clone());
        }

        fn dismiss(&self) {
            self.dismissed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_relay_and_dismiss() {
        let presenter = Arc::new(Counting::default());
        let relay = ErrorRelay::new(session(), presenter.clone());

        relay.relay("Tracking lost");
        assert_eq!(*presenter.presented.lock(), vec!["Tracking lost".to_string()]);
        assert_eq!(
            relay.current().map(|n| n.message),
            Some("Tracking lost".to_string())
        );

        relay.dismiss();
        relay.dismiss();
        assert_eq!(presenter.dismissed.load(Ordering::SeqCst), 1);
        assert!(relay.current().is_none());
    }

    #[test]
    fn test_newer_notice_replaces_current() {
        let relay = ErrorRelay::new(session(), Arc::new(LogPresenter));
        relay.relay("first");
        relay.relay("second");
        assert_eq!(relay.current().map(|n| n.to_string()), Some("second".to_string()));
    }

    #[test]
    fn test_panicking_presenter_is_contained() {
        struct Detached;

        impl ErrorPresenter for Detached {
            fn present(&self, _notice: &ErrorNotice) {
                panic!("view already detached");
            }

            fn dismiss(&self) {
                panic!("view already detached");
            }
        }

        let relay = ErrorRelay::new(session(), Arc::new(Detached));

        relay.relay("Camera unavailable");
        assert!(relay.current().is_some());
        relay.dismiss();
    }
}
