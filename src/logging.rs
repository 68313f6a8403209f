//! Injected logging capability
//!
//! Buffers carry a [`Logger`] chosen at construction instead of writing to a
//! process-wide sink. A logger either forwards to the ambient `tracing`
//! subscriber or to an explicit [`tracing::Dispatch`], which lets tests
//! capture or silence a single buffer deterministically.

use tracing::Dispatch;

#[derive(Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    /// Forward to whatever subscriber is current on the calling thread
    #[must_use]
    pub fn ambient() -> Self {
        Self { dispatch: None }
    }

    /// Route every event through `dispatch`
    #[must_use]
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Drop every event
    #[must_use]
    pub fn silent() -> Self {
        Self::with_dispatch(Dispatch::none())
    }

    /// Run `f` with this logger installed as the default subscriber
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("injected", &self.dispatch.is_some())
            .finish()
    }
}
