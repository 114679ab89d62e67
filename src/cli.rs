use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segmux")]
#[command(author, version, about = "Time-segmented multi-track recording controller")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Recorder parameter string (overrides the config file)
    #[arg(short, long, global = true)]
    pub params: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive a synthetic stream through the recorder and report what happened
    Simulate {
        /// Seconds of media to generate
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Video frames per second
        #[arg(long, default_value = "25")]
        fps: u32,

        /// Frames per GOP (keyframe interval)
        #[arg(long, default_value = "25")]
        gop: u32,

        /// Timestamp of the first frame, in microseconds
        #[arg(long, default_value = "0")]
        start_us: i64,

        /// Fail video writes after this many succeeded
        #[arg(long)]
        fail_video_after: Option<u64>,

        /// Fail every container open
        #[arg(long)]
        fail_open: bool,

        /// Run the recorder on its worker thread
        #[arg(long)]
        worker: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview the file names the recorder would generate
    Names {
        /// Number of names to generate
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Validate the recorder configuration
    Validate,

    /// Display version information
    Version,
}
