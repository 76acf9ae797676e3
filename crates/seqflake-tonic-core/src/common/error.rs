//! Error types for the seqflake service.
//!
//! [`Error`] covers everything a request can fail with, and
//! `From<Error> for tonic::Status` decides which gRPC code the client sees.
//!
//! ## Error Cases
//! - `ChannelError`: the uuid worker could not be reached or dropped the reply.
//! - `Sequence`: a store-backed operation failed (see [`seqflake::Error`]).
//! - `InvalidRequest`: the client request was malformed.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the seqflake service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (closed channel, dropped reply).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Counter or machine id operation against the store failed.
    #[error(transparent)]
    Sequence(#[from] seqflake::Error),

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => Status::internal(format!("Channel error: {context}")),
            Error::Sequence(e) => match e {
                seqflake::Error::NotFound { key } => {
                    Status::not_found(format!("counter `{key}` does not exist"))
                }
                seqflake::Error::Malformed { .. } => Status::data_loss(e.to_string()),
                seqflake::Error::StoreUnavailable { .. } => Status::unavailable(e.to_string()),
                other => Status::internal(other.to_string()),
            },
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn code(err: impl Into<Error>) -> Code {
        Status::from(err.into()).code()
    }

    #[test]
    fn store_errors_map_to_distinct_codes() {
        assert_eq!(
            code(seqflake::Error::NotFound {
                key: "/seqs/x".into()
            }),
            Code::NotFound
        );
        assert_eq!(
            code(seqflake::Error::Malformed {
                key: "/seqs/x".into(),
                reason: "not a number".into()
            }),
            Code::DataLoss
        );
        assert_eq!(
            code(seqflake::Error::StoreUnavailable {
                reason: "timeout".into()
            }),
            Code::Unavailable
        );
    }

    #[test]
    fn service_errors_map_to_codes() {
        assert_eq!(
            code(Error::InvalidRequest {
                reason: "empty name".into()
            }),
            Code::InvalidArgument
        );
        assert_eq!(code(Error::ServiceShutdown), Code::Unavailable);
        assert_eq!(
            code(Error::ChannelError {
                context: "closed".into()
            }),
            Code::Internal
        );
    }

    #[test]
    fn not_found_message_names_the_key() {
        let status = Status::from(Error::from(seqflake::Error::NotFound {
            key: "/seqs/orders".into(),
        }));
        assert!(status.message().contains("/seqs/orders"));
    }
}
