use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::request::message::MessageError;
use crate::settings::Settings;
use crate::slurm::command::{CommandDescription, JobCommand};
use crate::slurm::resources::{ResourceRequest, RuntimeProfile};
use crate::slurm::script::{synthesize, ScriptError, SubmissionScript};

/// A job request message, as sent by the backend
#[derive(Debug, Deserialize, Serialize)]
pub struct JobRequest {
    pub job_name: String,
    /// dannce io.yaml, outside the container
    pub config_path: PathBuf,
    /// working directory of the container process
    pub cwd_path: PathBuf,
    /// SLURM output file
    pub log_path: PathBuf,
    pub command: CommandDescription,
    pub runtime: RuntimeProfile,
}

/// A job request with a built command and checked resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub job_name: String,
    pub config_path: PathBuf,
    pub cwd_path: PathBuf,
    pub log_path: PathBuf,
    pub command: JobCommand,
    pub resources: ResourceRequest,
}

impl JobRequest {
    /// Build the command and resources, rejecting values no shell word can carry
    pub fn build(self) -> Result<SubmissionRequest, MessageError> {
        reject_nul("job_name", &self.job_name)?;
        reject_nul("config_path", &self.config_path.to_string_lossy())?;
        reject_nul("cwd_path", &self.cwd_path.to_string_lossy())?;
        reject_nul("log_path", &self.log_path.to_string_lossy())?;

        let command = JobCommand::build(&self.command)?;
        let resources = ResourceRequest::try_from(self.runtime)?;
        info!("Built {} job {}", command.model(), self.job_name);

        Ok(SubmissionRequest {
            job_name: self.job_name,
            config_path: self.config_path,
            cwd_path: self.cwd_path,
            log_path: self.log_path,
            command,
            resources,
        })
    }
}

fn reject_nul(field: &'static str, value: &str) -> Result<(), MessageError> {
    if value.contains('\0') {
        return Err(MessageError::NulByte { field });
    }
    Ok(())
}

impl SubmissionRequest {
    pub fn synthesize(&self, settings: &Settings) -> Result<SubmissionScript, ScriptError> {
        synthesize(
            settings,
            &self.config_path,
            &self.command,
            &self.cwd_path,
            &self.job_name,
            &self.resources,
            &self.log_path,
        )
    }
}
