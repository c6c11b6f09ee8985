use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::request::job::{JobRequest, SubmissionRequest};
use crate::request::schema::load_schema;
use crate::slurm::command::CommandError;
use crate::slurm::resources::ResourceError;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("can't read job request {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("job request is not valid JSON: {0}")]
    Decode(serde_json::Error),
    #[error("job request fails validation: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("can't deserialise job request: {0}")]
    Deserialisation(serde_json::Error),
    #[error("bad job request schema: {0}")]
    Schema(String),
    #[error("{field} contains a NUL byte")]
    NulByte { field: &'static str },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Resources(#[from] ResourceError),
}

/// A job request message on disk
pub struct Message {
    pub path: PathBuf,
    pub compiled_schema: JSONSchema,
}

impl Message {
    pub fn new(path: &Path) -> Result<Message, MessageError> {
        Ok(Message { path: path.to_path_buf(), compiled_schema: load_schema()? })
    }

    /// Read, validate, and build a message into a submission request
    pub fn read(&self) -> Result<SubmissionRequest, MessageError> {
        let json: Value = self.parse_untyped_json()?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Job request {} matches the schema", self.path.display());
                self.parse_json(json)?.build()
            }
            Err(err) => {
                warn!("Job request {} rejected by the schema", self.path.display());
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<(), MessageError> {
        info!("Checking job request against the bundled schema");
        self.compiled_schema.validate(json).map_err(|errors| {
            let errors: Vec<String> = errors.map(|err| err.to_string()).collect();
            for err in &errors {
                warn!("{err}");
            }
            MessageError::Validation(errors)
        })
    }

    fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Loading job request {}", path.display());
        fs::read_to_string(path).map_err(|source| {
            warn!("Job request {} is unreadable: {}", path.display(), source);
            MessageError::Read { path: self.path.clone(), source }
        })
    }

    fn parse_json(&self, value: Value) -> Result<JobRequest, MessageError> {
        info!("Decoding job request fields");
        serde_json::from_value::<JobRequest>(value).map_err(MessageError::Deserialisation)
    }

    fn parse_untyped_json(&self) -> Result<Value, MessageError> {
        info!("Parsing job request JSON");
        let json_string = self.read_file()?;
        serde_json::from_str::<Value>(&json_string).map_err(MessageError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slurm::command::JobCommand;

    fn write_message(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("msg.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn read_valid_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_message(
            dir.path(),
            r#"{
                "job_name": "run 1; rm -rf",
                "config_path": "/cfg 1.yaml",
                "cwd_path": "/data/slurm-cwd",
                "log_path": "/logs/a b.log",
                "command": {"kind": "predict", "model": "com", "batch_size": 4},
                "runtime": {"name": "default", "memory_gb": 8, "time_hrs": 2, "n_cpus": 4, "partition_list": "gpu,debug"}
            }"#,
        );

        let request = Message::new(&path).unwrap().read().unwrap();
        assert_eq!(request.job_name, "run 1; rm -rf");
        assert_eq!(request.resources.partition_list(), "gpu,debug");
        assert!(matches!(request.command, JobCommand::Predict(_)));
        assert_eq!(request.command.render(), "dannce predict com --batch-size 4");
    }

    #[test]
    fn schema_violations_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_message(dir.path(), r#"{"job_name": "incomplete"}"#);
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(err, MessageError::Validation(ref errors) if !errors.is_empty()));
    }

    #[test]
    fn invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_message(dir.path(), "{not json");
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(err, MessageError::Decode(_)));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Message::new(&dir.path().join("nope.json")).unwrap().read().unwrap_err();
        assert!(matches!(err, MessageError::Read { .. }));
    }

    #[test]
    fn construction_errors_surface_from_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_message(
            dir.path(),
            r#"{
                "job_name": "zero",
                "config_path": "/cfg.yaml",
                "cwd_path": "/cwd",
                "log_path": "/log",
                "command": {"kind": "train", "model": "dannce"},
                "runtime": {"name": "default", "memory_gb": 0, "time_hrs": 2, "n_cpus": 4, "partition_list": "gpu"}
            }"#,
        );
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(
            err,
            MessageError::Resources(ResourceError::NotPositive { field: "memory_gb", value: 0 })
        ));

        let path = write_message(
            dir.path(),
            r#"{
                "job_name": "no model",
                "config_path": "/cfg.yaml",
                "cwd_path": "/cwd",
                "log_path": "/log",
                "command": {"kind": "train"},
                "runtime": {"name": "default", "memory_gb": 8, "time_hrs": 2, "n_cpus": 4, "partition_list": "gpu"}
            }"#,
        );
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(err, MessageError::Command(CommandError::MissingModel { .. })));
    }

    #[test]
    fn nul_bytes_are_rejected_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_message(
            dir.path(),
            r#"{
                "job_name": "run\u0000; rm -rf",
                "config_path": "/cfg.yaml",
                "cwd_path": "/cwd",
                "log_path": "/log",
                "command": {"kind": "predict", "model": "com"},
                "runtime": {"name": "default", "memory_gb": 8, "time_hrs": 2, "n_cpus": 4, "partition_list": "gpu"}
            }"#,
        );
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(err, MessageError::NulByte { field: "job_name" }));

        let path = write_message(
            dir.path(),
            r#"{
                "job_name": "run 1",
                "config_path": "/cfg.yaml",
                "cwd_path": "/cwd",
                "log_path": "/log",
                "command": {"kind": "predict", "model": "com"},
                "runtime": {"name": "default", "memory_gb": 8, "time_hrs": 2, "n_cpus": 4, "partition_list": "gpu\u0000debug"}
            }"#,
        );
        let err = Message::new(&path).unwrap().read().unwrap_err();
        assert!(matches!(
            err,
            MessageError::Resources(ResourceError::NulByte { field: "partition_list" })
        ));
    }
}
