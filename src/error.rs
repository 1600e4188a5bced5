//! Error taxonomy for xchange-ops

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for operator-client operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid SS58 address or out-of-range derivation input
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed or schema-mismatched bytes
    #[error("codec error: {0}")]
    Codec(String),

    /// The (pallet, function) pair is not in the call registry
    #[error("unknown call {pallet}::{function}")]
    UnknownCall { pallet: String, function: String },

    /// A composed parameter set does not match the registered schema
    #[error("parameter mismatch for {pallet}::{function}: {detail}")]
    ParamMismatch {
        pallet: String,
        function: String,
        detail: String,
    },

    /// The node rejected the extrinsic at validation time
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// No terminal inclusion report arrived in time; the transaction's fate
    /// is unresolved and the caller must re-query state before retrying.
    #[error("no inclusion report within {0:?}; transaction fate unresolved")]
    InclusionTimeout(Duration),

    /// Connection lost before a response was obtained
    #[error("transport failure: {0}")]
    Transport(String),

    /// The ledger declined a device/order state-machine transition
    #[error("transition rejected: {0}")]
    TransitionRejected(String),

    /// Invalid caller-supplied input
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<parity_scale_codec::Error> for Error {
    fn from(err: parity_scale_codec::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<subxt::error::DecodeError> for Error {
    fn from(err: subxt::error::DecodeError) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<subxt::Error> for Error {
    fn from(err: subxt::Error) -> Self {
        match err {
            subxt::Error::Rpc(e) => Error::Transport(e.to_string()),
            subxt::Error::Transaction(e) => Error::SubmissionRejected(e.to_string()),
            subxt::Error::Runtime(e) => Error::TransitionRejected(e.to_string()),
            subxt::Error::Codec(e) => Error::Codec(e.to_string()),
            subxt::Error::Decode(e) => Error::Codec(e.to_string()),
            subxt::Error::Encode(e) => Error::Codec(e.to_string()),
            subxt::Error::Metadata(e) => Error::InvalidInput(e.to_string()),
            other => Error::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidAddress("bad address".to_string());
        assert_eq!(err.to_string(), "invalid address: bad address");
    }

    #[test]
    fn test_unknown_call_display() {
        let err = Error::UnknownCall {
            pallet: "Balances".into(),
            function: "teleport".into(),
        };
        assert_eq!(err.to_string(), "unknown call Balances::teleport");
    }

    #[test]
    fn test_scale_error_maps_to_codec() {
        let scale_err = parity_scale_codec::Error::from("truncated");
        let err: Error = scale_err.into();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_dispatch_error_maps_to_transition_rejected() {
        // an included-but-failed extrinsic reports a runtime dispatch error
        let dispatch = subxt::Error::Runtime(subxt::error::DispatchError::Other);
        let err: Error = dispatch.into();
        assert!(matches!(err, Error::TransitionRejected(_)));
    }
}
