//! Navigation hook used when the session cannot be recovered

/// Sends the user to another entry point of the front end
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Navigate to `path`, e.g. the login entry point
    fn navigate(&self, path: &str);
}

/// Navigator that only records the redirect in the log
///
/// Suitable for front ends that poll the session flag instead of reacting to
/// a navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigation requested");
    }
}
