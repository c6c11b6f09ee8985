//! Job request messages sent by the backend

/// Valid JSON messages are deserialised into a set of structs defined here
pub mod job;
pub mod message;
/// Bundled JSON schema for job requests
pub mod schema;
