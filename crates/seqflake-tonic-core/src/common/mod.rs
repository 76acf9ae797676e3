//! Protocol bindings, the service error type and shared type aliases.

pub mod error;
pub mod types;

pub use error::*;

/// Generated protobuf messages and gRPC client/server stubs.
pub mod proto {
    #![allow(clippy::all, clippy::pedantic)]
    tonic::include_proto!("seqflake");

    /// Encoded file descriptor set, registered with the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("seqflake_descriptor");
}
