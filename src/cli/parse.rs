//! CLI parse: clap types for Shotlist. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shotlist CLI - storyboard, pose-variant, speech, video and live voice generation
#[derive(Parser, Debug)]
#[command(name = "shotlist")]
#[command(about = "Parallel storyboard and pose-variant generation over a hosted generative API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable all log output
    #[arg(long)]
    pub quiet: bool,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan a campaign and generate one image per storyboard shot
    Storyboard {
        /// Product reference image
        #[arg(long)]
        product: PathBuf,
        /// Face reference image
        #[arg(long)]
        face: Option<PathBuf>,
        /// Background reference image
        #[arg(long)]
        background: Option<PathBuf>,
        /// Product description (analyzed from the image when omitted)
        #[arg(long)]
        description: Option<String>,
        /// Preferred product color
        #[arg(long)]
        color: Option<String>,
        /// portrait, landscape or square
        #[arg(long, default_value = "portrait")]
        orientation: String,
        /// id, en or ms
        #[arg(long, default_value = "id")]
        language: String,
        /// Extra direction for the planner
        #[arg(long)]
        prompt: Option<String>,
        /// Directory for generated images and the campaign plan
        #[arg(long, default_value = "storyboard")]
        out: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate eight angle/pose variants of one image
    Edit {
        /// Source image
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        face: Option<PathBuf>,
        #[arg(long)]
        background: Option<PathBuf>,
        /// Instruction applied to every variant
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long, default_value = "9:16")]
        aspect_ratio: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long, default_value = "variants")]
        out: PathBuf,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Synthesize speech to a WAV file
    Speak {
        /// Text to speak
        #[arg(long, conflicts_with = "text_file")]
        text: Option<String>,
        /// Read the text from a file
        #[arg(long)]
        text_file: Option<PathBuf>,
        /// Prebuilt voice (defaults to audio.voice)
        #[arg(long)]
        voice: Option<String>,
        /// Delivery instruction, e.g. "Say cheerfully"
        #[arg(long)]
        instruction: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long, default_value = "speech.wav")]
        out: PathBuf,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Animate an image into a short video
    Video {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: String,
        /// 9:16 or 16:9
        #[arg(long, default_value = "9:16")]
        aspect_ratio: String,
        #[arg(long, default_value = "video.mp4")]
        out: PathBuf,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run a realtime voice session from a WAV file
    Live {
        /// Input speech (16-bit WAV)
        #[arg(long)]
        input: PathBuf,
        /// Where to write the rendered reply audio
        #[arg(long, default_value = "reply.wav")]
        output: PathBuf,
        #[arg(long)]
        voice: Option<String>,
        /// System instruction for the session
        #[arg(long)]
        instruction: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (API key redacted)
    Show {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate the effective configuration
    Validate {
        #[arg(long, default_value = "text")]
        format: String,
    },
}
