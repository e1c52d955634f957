//! User-facing notices raised by the client.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
    /// The session ended; the user has to sign in again.
    RedirectToLogin,
}

/// Receives notices from the auth context and the request pipeline. The
/// embedding application decides how to show them.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);

    fn redirect_to_login(&self);
}

/// Reports notices through `tracing`.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(notice = "success", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::warn!(notice = "error", "{message}");
    }

    fn redirect_to_login(&self) {
        tracing::info!(notice = "redirect", "Session ended, sign-in required");
    }
}

/// Forwards notices into a channel, for UIs that poll an event queue.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notice: Notice) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.tx.send(notice);
    }
}

impl Notifier for ChannelNotifier {
    fn success(&self, message: &str) {
        self.send(Notice::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.send(Notice::Error(message.to_string()));
    }

    fn redirect_to_login(&self) {
        self.send(Notice::RedirectToLogin);
    }
}
