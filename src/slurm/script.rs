use std::fmt;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;

use log::info;
use serde::Serialize;
use thiserror::Error;
use tinytemplate::TinyTemplate;

use crate::settings::Settings;
use crate::slurm::command::JobCommand;
use crate::slurm::escape::{shell_formatter, verbatim_formatter};
use crate::slurm::resources::ResourceRequest;

/// Template failures are bugs in the embedded templates, never caused by job content
#[derive(Debug, Error)]
#[error("can't render {section} template: {source}")]
pub struct ScriptError {
    section: &'static str,
    #[source]
    source: tinytemplate::error::Error,
}

/// A complete sbatch script, ready to be written to disk and submitted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionScript {
    content: String,
}

impl SubmissionScript {
    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }

    /// Write the script to disk, replacing any existing file, and make it executable
    pub fn write(&self, out_path: &Path) -> Result<(), io::Error> {
        info!("Writing job script to {}", out_path.display());
        let mut file = File::create(out_path)?;
        file.write_all(self.content.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = file.metadata()?.permissions();
            permissions.set_mode(0o755);
            file.set_permissions(permissions)?;
        }

        Ok(())
    }
}

impl fmt::Display for SubmissionScript {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Rendered SBATCH header
///
/// sbatch reads `#SBATCH` options [before the first executable line](https://slurm.schedmd.com/sbatch.html#SECTION_DESCRIPTION),
/// so the header always comes first and its directives are always written in the same order:
/// memory, GPU, time, CPUs, partition, job name, output.
struct Header {
    content: String,
}

/// Rendered metadata comment, for humans reading the script later
struct Metadata {
    content: String,
}

/// Rendered container invocation
///
/// Runs the job command inside the singularity image with GPU passthrough (`--nv`), the working
/// directory bound with `--pwd`, and the dannce configuration file as the last argument.
struct Container {
    content: String,
}

/// Rendering context for header
#[derive(Serialize)]
struct HeaderContext<'a> {
    memory_gb: u32,
    gpus: u32,
    time_hrs: u32,
    n_cpus: u32,
    partition_list: &'a str,
    job_name: &'a str,
    log_path: String,
}

/// Rendering context for metadata
#[derive(Serialize)]
struct MetadataContext<'a> {
    runtime_name: &'a str,
}

/// Rendering context for container
#[derive(Serialize)]
struct ContainerContext {
    image_path: String,
    cwd_path: String,
    command: String,
    config_path: String,
}

/// Synthesize the sbatch script for one job
///
/// Every value is shell quoted on its way into the template except the rendered command, which
/// [`JobCommand`] guarantees is already safe. Pure: no I/O, same inputs give the same text.
pub fn synthesize(
    settings: &Settings,
    config_path: &Path,
    command: &JobCommand,
    cwd_path: &Path,
    job_name: &str,
    resources: &ResourceRequest,
    log_path: &Path,
) -> Result<SubmissionScript, ScriptError> {
    let header = render_header(resources, job_name, log_path)?;
    let metadata = render_metadata(resources)?;
    let container = render_container(settings, cwd_path, command, config_path)?;

    // order is important
    let content = [header.content, metadata.content, container.content].concat();
    Ok(SubmissionScript { content })
}

/// Template engine with shell quoting as the default formatter
///
/// `{value}` is always quoted, `{value | verbatim}` is the only way to paste raw text.
fn engine(name: &'static str, template: &'static str) -> Result<TinyTemplate<'static>, ScriptError> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&shell_formatter);
    tt.add_formatter("verbatim", verbatim_formatter);
    tt.add_template(name, template)
        .map_err(|source| ScriptError { section: name, source })?;
    Ok(tt)
}

fn render<C: Serialize>(name: &'static str, template: &'static str, context: &C) -> Result<String, ScriptError> {
    engine(name, template)?
        .render(name, context)
        .map_err(|source| ScriptError { section: name, source })
}

/// Render the SBATCH header using TinyTemplate
fn render_header(resources: &ResourceRequest, job_name: &str, log_path: &Path) -> Result<Header, ScriptError> {
    /// included header template
    static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));

    let context = HeaderContext {
        memory_gb: resources.memory_gb(),
        gpus: resources.gpus(),
        time_hrs: resources.time_hrs(),
        n_cpus: resources.n_cpus(),
        partition_list: resources.partition_list(),
        job_name,
        log_path: log_path.to_string_lossy().into_owned(),
    };

    Ok(Header { content: render("header", HEADER, &context)? })
}

/// Render the metadata comment using TinyTemplate
fn render_metadata(resources: &ResourceRequest) -> Result<Metadata, ScriptError> {
    /// included metadata template
    static METADATA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/metadata.txt"));
    let context = MetadataContext { runtime_name: resources.name() };
    Ok(Metadata { content: render("metadata", METADATA, &context)? })
}

/// Render the container invocation using TinyTemplate
fn render_container(
    settings: &Settings,
    cwd_path: &Path,
    command: &JobCommand,
    config_path: &Path,
) -> Result<Container, ScriptError> {
    /// included container template
    static CONTAINER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/container.txt"));

    let context = ContainerContext {
        image_path: settings.image_path.to_string_lossy().into_owned(),
        cwd_path: cwd_path.to_string_lossy().into_owned(),
        command: command.render(),
        config_path: config_path.to_string_lossy().into_owned(),
    };

    Ok(Container { content: render("container", CONTAINER, &context)? })
}
