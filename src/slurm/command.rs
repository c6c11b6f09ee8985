use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slurm::escape::quote;

/// Executable inside the container image
static PROGRAM: &str = "dannce";

/// Which network a job trains or predicts with
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Model {
    /// Center of mass detection
    Com,
    /// 3D pose estimation
    Dannce,
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Model::Com => write!(f, "com"),
            Model::Dannce => write!(f, "dannce"),
        }
    }
}

impl Model {
    fn parse(name: &str) -> Result<Model, CommandError> {
        match name {
            "com" => Ok(Model::Com),
            "dannce" => Ok(Model::Dannce),
            _ => Err(CommandError::UnknownModel(name.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown job kind `{0}`, expected `train` or `predict`")]
    UnknownKind(String),
    #[error("unknown model `{0}`, expected `com` or `dannce`")]
    UnknownModel(String),
    #[error("{kind} job is missing a model")]
    MissingModel { kind: String },
    #[error("{field} must be a positive integer, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("{field} is out of range, got {value} but the largest allowed is {}", u32::MAX)]
    TooLarge { field: &'static str, value: i64 },
    #[error("{field} can't be an empty path")]
    EmptyPath { field: &'static str },
    #[error("{field} contains a NUL byte")]
    NulByte { field: &'static str },
    #[error("{option} is not an option of {kind} jobs")]
    UnsupportedOption { kind: &'static str, option: &'static str },
}

/// Unvalidated command as it arrives in a job request
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CommandDescription {
    pub kind: String,
    pub model: Option<String>,
    pub epochs: Option<i64>,
    pub batch_size: Option<i64>,
    pub weights: Option<PathBuf>,
    pub finetune_weights: Option<PathBuf>,
}

/// Train a network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainCommand {
    pub model: Model,
    pub epochs: Option<NonZeroU32>,
    pub batch_size: Option<NonZeroU32>,
    /// Start training from these weights instead of from scratch
    pub finetune_weights: Option<PathBuf>,
}

/// Run a trained network over a video folder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictCommand {
    pub model: Model,
    pub batch_size: Option<NonZeroU32>,
    pub weights: Option<PathBuf>,
}

/// A job the container can run
///
/// Each variant knows how to write its own command line. The fragment is trusted by the script
/// synthesizer and pasted in verbatim, so anything user supplied (paths) is quoted here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobCommand {
    Train(TrainCommand),
    Predict(PredictCommand),
}

impl JobCommand {
    /// Build a command from a request, rejecting anything that can't be rendered safely
    pub fn build(description: &CommandDescription) -> Result<JobCommand, CommandError> {
        match description.kind.as_str() {
            "train" => {
                reject(description.weights.is_some(), "train", "weights")?;
                Ok(JobCommand::Train(TrainCommand {
                    model: required_model(description)?,
                    epochs: positive("epochs", description.epochs)?,
                    batch_size: positive("batch_size", description.batch_size)?,
                    finetune_weights: non_empty("finetune_weights", &description.finetune_weights)?,
                }))
            }
            "predict" => {
                reject(description.epochs.is_some(), "predict", "epochs")?;
                reject(description.finetune_weights.is_some(), "predict", "finetune_weights")?;
                Ok(JobCommand::Predict(PredictCommand {
                    model: required_model(description)?,
                    batch_size: positive("batch_size", description.batch_size)?,
                    weights: non_empty("weights", &description.weights)?,
                }))
            }
            other => Err(CommandError::UnknownKind(other.to_string())),
        }
    }

    /// Full command line for the container, e.g. `dannce predict com --batch-size 4`
    pub fn render(&self) -> String {
        match self {
            JobCommand::Train(train) => train.render(),
            JobCommand::Predict(predict) => predict.render(),
        }
    }

    pub fn model(&self) -> Model {
        match self {
            JobCommand::Train(train) => train.model,
            JobCommand::Predict(predict) => predict.model,
        }
    }
}

impl fmt::Display for JobCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl TrainCommand {
    fn render(&self) -> String {
        let mut args = vec![PROGRAM.to_string(), "train".to_string(), self.model.to_string()];
        if let Some(epochs) = self.epochs {
            args.push(format!("--epochs {epochs}"));
        }
        if let Some(batch_size) = self.batch_size {
            args.push(format!("--batch-size {batch_size}"));
        }
        if let Some(weights) = &self.finetune_weights {
            let flag = match self.model {
                Model::Com => "--com-finetune-weights",
                Model::Dannce => "--dannce-finetune-weights",
            };
            args.push(format!("{flag} {}", quote(&weights.to_string_lossy())));
        }
        args.join(" ")
    }
}

impl PredictCommand {
    fn render(&self) -> String {
        let mut args = vec![PROGRAM.to_string(), "predict".to_string(), self.model.to_string()];
        if let Some(batch_size) = self.batch_size {
            args.push(format!("--batch-size {batch_size}"));
        }
        if let Some(weights) = &self.weights {
            let flag = match self.model {
                Model::Com => "--com-predict-weights",
                Model::Dannce => "--dannce-predict-model",
            };
            args.push(format!("{flag} {}", quote(&weights.to_string_lossy())));
        }
        args.join(" ")
    }
}

fn required_model(description: &CommandDescription) -> Result<Model, CommandError> {
    match &description.model {
        Some(name) => Model::parse(name),
        None => Err(CommandError::MissingModel { kind: description.kind.clone() }),
    }
}

fn positive(field: &'static str, value: Option<i64>) -> Result<Option<NonZeroU32>, CommandError> {
    value
        .map(|v| match u32::try_from(v) {
            Ok(n) => NonZeroU32::new(n).ok_or(CommandError::NotPositive { field, value: v }),
            Err(_) if v > 0 => Err(CommandError::TooLarge { field, value: v }),
            Err(_) => Err(CommandError::NotPositive { field, value: v }),
        })
        .transpose()
}

fn non_empty(field: &'static str, path: &Option<PathBuf>) -> Result<Option<PathBuf>, CommandError> {
    match path {
        Some(p) if p.as_os_str().is_empty() => Err(CommandError::EmptyPath { field }),
        Some(p) if p.to_string_lossy().contains('\0') => Err(CommandError::NulByte { field }),
        other => Ok(other.clone()),
    }
}

fn reject(present: bool, kind: &'static str, option: &'static str) -> Result<(), CommandError> {
    if present {
        return Err(CommandError::UnsupportedOption { kind, option });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(kind: &str, model: &str) -> CommandDescription {
        CommandDescription { kind: kind.to_string(), model: Some(model.to_string()), ..Default::default() }
    }

    #[test]
    fn bare_predict() {
        let command = JobCommand::build(&describe("predict", "com")).unwrap();
        assert_eq!(command.render(), "dannce predict com");
        assert_eq!(command.model(), Model::Com);
    }

    #[test]
    fn train_with_options() {
        let description = CommandDescription {
            epochs: Some(100),
            batch_size: Some(4),
            ..describe("train", "dannce")
        };
        let command = JobCommand::build(&description).unwrap();
        assert_eq!(command.render(), "dannce train dannce --epochs 100 --batch-size 4");
    }

    #[test]
    fn weight_paths_are_quoted_inside_the_fragment() {
        let description = CommandDescription {
            weights: Some(PathBuf::from("/weights/my model; rm -rf ~.hdf5")),
            ..describe("predict", "dannce")
        };
        let command = JobCommand::build(&description).unwrap();
        assert_eq!(
            command.render(),
            "dannce predict dannce --dannce-predict-model '/weights/my model; rm -rf ~.hdf5'"
        );

        let description = CommandDescription {
            finetune_weights: Some(PathBuf::from("/weights/com.h5")),
            ..describe("train", "com")
        };
        let command = JobCommand::build(&description).unwrap();
        assert_eq!(command.to_string(), "dannce train com --com-finetune-weights /weights/com.h5");
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            JobCommand::build(&describe("evaluate", "com")),
            Err(CommandError::UnknownKind("evaluate".to_string()))
        );
        assert_eq!(
            JobCommand::build(&describe("train", "yolo")),
            Err(CommandError::UnknownModel("yolo".to_string()))
        );

        let missing = CommandDescription { kind: "train".to_string(), ..Default::default() };
        assert_eq!(
            JobCommand::build(&missing),
            Err(CommandError::MissingModel { kind: "train".to_string() })
        );

        let zero_epochs = CommandDescription { epochs: Some(0), ..describe("train", "com") };
        assert_eq!(
            JobCommand::build(&zero_epochs),
            Err(CommandError::NotPositive { field: "epochs", value: 0 })
        );

        let negative = CommandDescription { batch_size: Some(-4), ..describe("predict", "com") };
        assert_eq!(
            JobCommand::build(&negative),
            Err(CommandError::NotPositive { field: "batch_size", value: -4 })
        );

        let huge = CommandDescription { epochs: Some(5_000_000_000), ..describe("train", "com") };
        let err = JobCommand::build(&huge).unwrap_err();
        assert_eq!(err, CommandError::TooLarge { field: "epochs", value: 5_000_000_000 });
        assert!(!err.to_string().contains("positive"));

        let epochs_on_predict = CommandDescription { epochs: Some(3), ..describe("predict", "com") };
        assert_eq!(
            JobCommand::build(&epochs_on_predict),
            Err(CommandError::UnsupportedOption { kind: "predict", option: "epochs" })
        );

        let empty = CommandDescription { weights: Some(PathBuf::new()), ..describe("predict", "com") };
        assert_eq!(JobCommand::build(&empty), Err(CommandError::EmptyPath { field: "weights" }));

        let nul = CommandDescription {
            finetune_weights: Some(PathBuf::from("/weights/a\0b.h5")),
            ..describe("train", "dannce")
        };
        assert_eq!(JobCommand::build(&nul), Err(CommandError::NulByte { field: "finetune_weights" }));
    }

    #[test]
    fn render_is_deterministic() {
        let command = JobCommand::build(&CommandDescription { batch_size: Some(2), ..describe("predict", "com") })
            .unwrap();
        assert_eq!(command.render(), command.render());
    }
}
