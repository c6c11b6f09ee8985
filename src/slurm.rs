//! Build job commands and render them into sbatch scripts

/// Shell quoting, applied to everything interpolated into a script
pub mod escape;

/// The jobs dannce can run, and their command lines
pub mod command;

/// Resources reserved from SLURM for a job
pub mod resources;

/// Read script templates and render them with job content
pub mod script;
