//! Unified error type for the wirehub meta crate.

use wirehub_hub::HubError;
use wirehub_protocol::ProtocolError;
use wirehub_session::SessionError;
use wirehub_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum WirehubError {
    /// Binding, accepting, or socket I/O failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Outbound queue or presence store failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The manager actor stopped accepting work.
    #[error(transparent)]
    Hub(#[from] HubError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wirehub_err: WirehubError = err.into();
        assert!(matches!(wirehub_err, WirehubError::Transport(_)));
        assert!(wirehub_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let wirehub_err: WirehubError = err.into();
        assert!(matches!(wirehub_err, WirehubError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Presence("redis down".into());
        let wirehub_err: WirehubError = err.into();
        assert!(matches!(wirehub_err, WirehubError::Session(_)));
        assert!(wirehub_err.to_string().contains("redis down"));
    }

    #[test]
    fn test_from_hub_error() {
        let err = HubError::MailboxClosed("login");
        let wirehub_err: WirehubError = err.into();
        assert!(matches!(wirehub_err, WirehubError::Hub(_)));
        assert_eq!(wirehub_err.to_string(), "login mailbox is closed");
    }
}
