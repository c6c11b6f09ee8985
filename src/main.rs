use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use dannce_sbatch::request::message::Message;
use dannce_sbatch::settings::Settings;
use dannce_sbatch::video::FrameExtractor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Singularity image with dannce installed
    #[arg(long, default_value = "/opt/sdannce/sdannce.sif")]
    image_path: PathBuf,
    /// Folder where extracted frames are written
    #[arg(long, default_value = "instance_data/static_tmp")]
    tmp_dir: PathBuf,
    /// Video decoder executable
    #[arg(long, default_value = "ffmpeg")]
    decoder: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an sbatch script from a JSON job request
    Script {
        /// Path to a job request message
        #[arg(short, long)]
        message: PathBuf,
        /// Write the script here instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Extract one frame from a video as a png
    Frame {
        #[arg(short, long)]
        video: PathBuf,
        /// Zero based frame index
        #[arg(short, long)]
        index: u64,
        #[arg(short, long, default_value_t = 50)]
        fps: u32,
        /// File name inside the tmp folder (random if not set)
        #[arg(long)]
        output_name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let args = Args::parse();
    let settings = Settings::new(args.image_path, args.tmp_dir).with_decoder(args.decoder);

    match args.command {
        Commands::Script { message, out } => {
            let request = Message::new(&message)?
                .read()
                .with_context(|| format!("Can't build job from {}", message.display()))?;
            let script = request.synthesize(&settings)?;
            match out {
                Some(path) => script
                    .write(&path)
                    .with_context(|| format!("Can't write job script {}", path.display()))?,
                None => print!("{script}"),
            }
        }
        Commands::Frame { video, index, fps, output_name } => {
            let name = FrameExtractor::new(&settings).extract(&video, index, fps, output_name.as_deref())?;
            println!("{name}");
        }
    }

    Ok(())
}
