//! Schema registry: a small hand-rolled structural validator rather than
//! a JSON-Schema-draft crate. Walks a `serde_json::Value` descriptor once
//! at startup, then checks field presence and JSON type against it on
//! every inbound payload.

pub mod descriptor;
pub mod registry;

pub use registry::SchemaRegistry;
