use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vpost")]
#[command(about = "Watermark, merge and outro post-processing for uploaded videos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume jobs from the Redis queue until interrupted
    Worker,

    /// Stage a video and process it (queued when Redis answers, inline otherwise)
    Submit {
        /// Main video
        video: PathBuf,

        /// Second video, concatenated after the main one
        #[arg(long)]
        second: Option<PathBuf>,
    },

    /// Print the current status of a job as JSON
    Status {
        job_id: String,
    },

    /// Ask workers not to start a queued job
    Revoke {
        job_id: String,
    },

    /// Report whether NVENC H.264 encoding is available
    CheckGpu,

    /// Print queue, asset and ffmpeg health as JSON
    Health,
}
