//! Extract single frames from videos with an external decoder (ffmpeg)

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use log::{error, info};
use thiserror::Error;
use uuid::Uuid;

use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("framerate must be positive")]
    ZeroFramerate,
    /// 1000 / fps isn't a whole number of milliseconds, so seeking would drift off the frame
    #[error("framerate {framerate_fps} fps is not evenly divisible, may result in frame index offset errors")]
    UnevenFramerate { framerate_fps: u32 },
    #[error("frame {frame_index} at {framerate_fps} fps is past the largest seekable timestamp")]
    IndexOutOfRange { frame_index: u64, framerate_fps: u32 },
    #[error("output name `{0}` must be a plain file name")]
    InvalidOutputName(String),
    #[error("can't run decoder {}: {source}", .program.display())]
    Spawn { program: PathBuf, source: std::io::Error },
    #[error("unable to get frame {frame_index} from {}: decoder {status}", .video_path.display())]
    Decoder {
        video_path: PathBuf,
        frame_index: u64,
        framerate_fps: u32,
        output_path: PathBuf,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

/// Seek position of a frame, in whole milliseconds
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTimestamp {
    millis: u64,
}

impl FrameTimestamp {
    pub fn millis(&self) -> u64 {
        self.millis
    }
}

impl fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

/// Timestamp of a zero based frame index
pub fn frame_timestamp(frame_index: u64, framerate_fps: u32) -> Result<FrameTimestamp, FrameError> {
    if framerate_fps == 0 {
        return Err(FrameError::ZeroFramerate);
    }
    if 1000 % framerate_fps != 0 {
        return Err(FrameError::UnevenFramerate { framerate_fps });
    }
    let ms_per_frame = u64::from(1000 / framerate_fps);
    let millis = ms_per_frame
        .checked_mul(frame_index)
        .ok_or(FrameError::IndexOutOfRange { frame_index, framerate_fps })?;
    Ok(FrameTimestamp { millis })
}

/// Unique file name for a generated resource, e.g. `frame_<uuid>.png`
pub fn make_resource_name(prefix: &str, suffix: &str) -> String {
    format!("{prefix}{}{suffix}", Uuid::new_v4())
}

pub struct FrameExtractor<'a> {
    settings: &'a Settings,
}

impl<'a> FrameExtractor<'a> {
    pub fn new(settings: &'a Settings) -> FrameExtractor<'a> {
        FrameExtractor { settings }
    }

    /// Write one frame of a video to the static tmp folder as a png
    ///
    /// Returns the file name inside the static tmp folder. The timestamp is checked before the
    /// decoder runs, and the decoder is never retried.
    pub fn extract(
        &self,
        video_path: &Path,
        frame_index: u64,
        framerate_fps: u32,
        output_name: Option<&str>,
    ) -> Result<String, FrameError> {
        let timestamp = frame_timestamp(frame_index, framerate_fps)?;
        let output_name = match output_name {
            Some(name) if is_file_name(name) => name.to_string(),
            Some(name) => return Err(FrameError::InvalidOutputName(name.to_string())),
            None => make_resource_name("frame_", ".png"),
        };
        let output_path = self.settings.static_tmp_folder.join(&output_name);

        let mut decoder = Command::new(&self.settings.decoder);
        let cmd = decoder
            .arg("-ss")
            .arg(timestamp.to_string())
            .arg("-i")
            .arg(video_path)
            .args(["-vframes", "1"])
            // disable audio processing
            .arg("-an")
            .arg(&output_path)
            .args(["-abort_on", "empty_output"]);
        info!("Extracting frame {frame_index} at {timestamp} from {}", video_path.display());
        info!("{:?}", &cmd);

        let output = cmd.output().map_err(|source| FrameError::Spawn {
            program: self.settings.decoder.clone(),
            source,
        })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!("Decoder exited with {}", output.status);
            error!("video path: {}", video_path.display());
            error!("frame index: {frame_index}");
            error!("framerate fps: {framerate_fps}");
            error!("output path: {}", output_path.display());
            error!("> stdout: {stdout}");
            error!("> stderr: {stderr}");
            return Err(FrameError::Decoder {
                video_path: video_path.to_path_buf(),
                frame_index,
                framerate_fps,
                output_path,
                status: output.status,
                stdout,
                stderr,
            });
        }

        Ok(output_name)
    }
}

fn is_file_name(name: &str) -> bool {
    Path::new(name).file_name().is_some_and(|file_name| file_name == name)
}
