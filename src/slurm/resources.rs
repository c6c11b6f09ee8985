use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Jobs always reserve a single GPU
pub const GPU_COUNT: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{field} must be a positive integer, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("{field} is out of range, got {value} but the largest allowed is {}", u32::MAX)]
    TooLarge { field: &'static str, value: i64 },
    #[error("partition list can't be empty")]
    EmptyPartition,
    #[error("{field} contains a NUL byte")]
    NulByte { field: &'static str },
}

/// Resources reserved from SLURM for one job
///
/// Values are checked once, here, so the script synthesizer never writes a directive like
/// `--mem=0GB`. A runtime profile in a request message deserialises through the same checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuntimeProfile", into = "RuntimeProfile")]
pub struct ResourceRequest {
    memory_gb: NonZeroU32,
    time_hrs: NonZeroU32,
    n_cpus: NonZeroU32,
    partition_list: String,
    name: String,
}

/// A runtime profile as stored by the backend, before validation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeProfile {
    /// Display name, only written to a comment
    pub name: String,
    pub memory_gb: i64,
    pub time_hrs: i64,
    pub n_cpus: i64,
    /// One partition or a comma separated list
    pub partition_list: String,
}

impl ResourceRequest {
    pub fn new(
        memory_gb: i64,
        time_hrs: i64,
        n_cpus: i64,
        partition_list: &str,
        name: &str,
    ) -> Result<ResourceRequest, ResourceError> {
        if partition_list.is_empty() {
            return Err(ResourceError::EmptyPartition);
        }
        if partition_list.contains('\0') {
            return Err(ResourceError::NulByte { field: "partition_list" });
        }
        if name.contains('\0') {
            return Err(ResourceError::NulByte { field: "name" });
        }

        Ok(ResourceRequest {
            memory_gb: positive("memory_gb", memory_gb)?,
            time_hrs: positive("time_hrs", time_hrs)?,
            n_cpus: positive("n_cpus", n_cpus)?,
            partition_list: partition_list.to_string(),
            name: name.to_string(),
        })
    }

    pub fn memory_gb(&self) -> u32 {
        self.memory_gb.get()
    }

    pub fn time_hrs(&self) -> u32 {
        self.time_hrs.get()
    }

    pub fn n_cpus(&self) -> u32 {
        self.n_cpus.get()
    }

    pub fn partition_list(&self) -> &str {
        &self.partition_list
    }

    /// Runtime profile name, metadata only
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gpus(&self) -> u32 {
        GPU_COUNT
    }
}

impl TryFrom<RuntimeProfile> for ResourceRequest {
    type Error = ResourceError;

    fn try_from(profile: RuntimeProfile) -> Result<Self, Self::Error> {
        ResourceRequest::new(
            profile.memory_gb,
            profile.time_hrs,
            profile.n_cpus,
            &profile.partition_list,
            &profile.name,
        )
    }
}

impl From<ResourceRequest> for RuntimeProfile {
    fn from(request: ResourceRequest) -> Self {
        RuntimeProfile {
            name: request.name,
            memory_gb: request.memory_gb.get().into(),
            time_hrs: request.time_hrs.get().into(),
            n_cpus: request.n_cpus.get().into(),
            partition_list: request.partition_list,
        }
    }
}

fn positive(field: &'static str, value: i64) -> Result<NonZeroU32, ResourceError> {
    match u32::try_from(value) {
        Ok(n) => NonZeroU32::new(n).ok_or(ResourceError::NotPositive { field, value }),
        Err(_) if value > 0 => Err(ResourceError::TooLarge { field, value }),
        Err(_) => Err(ResourceError::NotPositive { field, value }),
    }
}
