//! Shared building blocks of the Bureau tool gateway: the error taxonomy,
//! declarative tool schemas and their validator, JSON-RPC envelopes, the
//! storage collaborator contract, and credential helpers.

pub mod auth;
pub mod envelope;
pub mod error;
pub mod schema;
pub mod store;
pub mod validate;

pub use error::{McpError, ValidationFailure};
pub use store::{Entity, ResourceKind, Store, StoreError};
