use crate::client::ClientError;
use crate::crypto::EnvelopeError;
use crate::storage::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalletError>;

/// Every failure a public wallet operation can resolve to
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("{0} not found.")]
    NotFound(String),

    #[error("{0} already exists.")]
    AlreadyExists(String),

    #[error("Corrupt wallet file: {0}")]
    Corrupt(String),

    #[error("Could not open wallet. Wrong password.")]
    WrongPassword,

    #[error("More than one TX Proposal matches {short_id}:\n{}", .candidates.join("\n"))]
    Ambiguous {
        short_id: String,
        candidates: Vec<String>,
    },

    #[error("Could not connect to the coordination service: {0}")]
    ConnectionRefused(String),

    #[error("{context}: {message}")]
    Remote { context: String, message: String },

    #[error("{0}")]
    NoPendingWork(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WalletError {
    /// Re-tag a remote failure with the operation it belongs to
    pub fn tagged(self, context: &str) -> Self {
        match self {
            WalletError::Remote { message, .. } => WalletError::Remote {
                context: context.to_string(),
                message,
            },
            other => other,
        }
    }
}

impl From<ClientError> for WalletError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ConnectionRefused(target) => WalletError::ConnectionRefused(target),
            ClientError::Remote(message) | ClientError::InvalidResponse(message) => {
                WalletError::Remote {
                    context: "Coordination service".to_string(),
                    message,
                }
            }
        }
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => {
                WalletError::NotFound(format!("File \"{}\"", path.display()))
            }
            StoreError::Corrupt { path, reason } => {
                WalletError::Corrupt(format!("{}: {}", path.display(), reason))
            }
            StoreError::Io(e) => WalletError::Io(e),
            StoreError::Envelope(e) => e.into(),
        }
    }
}

impl From<EnvelopeError> for WalletError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::WrongPassword => WalletError::WrongPassword,
            EnvelopeError::Malformed(reason) => WalletError::Corrupt(reason),
            EnvelopeError::Cipher(reason) => WalletError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                reason,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_refusal_is_distinct() {
        let err: WalletError = ClientError::ConnectionRefused("127.0.0.1:3232".into()).into();
        assert!(matches!(err, WalletError::ConnectionRefused(_)));
        assert!(err.to_string().starts_with("Could not connect"));
    }

    #[test]
    fn test_tagging_only_touches_remote_errors() {
        let err: WalletError = ClientError::Remote("not enough signatures".into()).into();
        assert_eq!(err.tagged("a1b2").to_string(), "a1b2: not enough signatures");

        let err = WalletError::WrongPassword.tagged("a1b2");
        assert!(matches!(err, WalletError::WrongPassword));
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = WalletError::Ambiguous {
            short_id: "aaaa".into(),
            candidates: vec!["\tfirst".into(), "\tsecond".into()],
        };
        let text = err.to_string();
        assert!(text.contains("aaaa"));
        assert!(text.contains("first") && text.contains("second"));
    }
}
