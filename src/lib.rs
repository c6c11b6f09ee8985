//! Turn dannce job requests into sbatch scripts that run inside a singularity container

pub mod request;
pub mod settings;
pub mod slurm;
pub mod video;
