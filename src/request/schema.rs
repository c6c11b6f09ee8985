use jsonschema::JSONSchema;
use serde_json::Value;

use crate::request::message::MessageError;

/// Compile the job request schema bundled with the binary
pub fn load_schema() -> Result<JSONSchema, MessageError> {
    /// included job request schema
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/job_request.json"));
    let schema_json: Value = serde_json::from_str(SCHEMA).map_err(|err| MessageError::Schema(err.to_string()))?;
    compile_schema(&schema_json)
}

fn compile_schema(schema: &Value) -> Result<JSONSchema, MessageError> {
    JSONSchema::compile(schema).map_err(|err| MessageError::Schema(err.to_string()))
}
