use std::path::PathBuf;

/// Deployment settings shared by script rendering and frame extraction
///
/// Built once by the caller and passed down explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Singularity image containing dannce
    pub image_path: PathBuf,
    /// Folder for short lived files served back to users (extracted frames)
    pub static_tmp_folder: PathBuf,
    /// Video decoder executable
    pub decoder: PathBuf,
}

impl Settings {
    pub fn new(image_path: PathBuf, static_tmp_folder: PathBuf) -> Settings {
        Settings { image_path, static_tmp_folder, decoder: PathBuf::from("ffmpeg") }
    }

    pub fn with_decoder(self, decoder: PathBuf) -> Settings {
        Settings { decoder, ..self }
    }
}
