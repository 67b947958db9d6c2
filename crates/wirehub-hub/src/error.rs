//! Error types for the hub layer.

/// Errors returned to callers submitting work to the manager actor.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The manager actor has stopped, so the named mailbox no longer
    /// accepts submissions.
    #[error("{0} mailbox is closed")]
    MailboxClosed(&'static str),
}
