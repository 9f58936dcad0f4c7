use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubescribe",
    about = "Tubescribe - Fetch YouTube transcripts for videos, channels and playlists",
    version,
    long_about = "Fetches YouTube transcripts through a chain of caption sources and returns them as JSON. Run it as an HTTP service with `serve`, or query single videos, channels and playlists from the command line."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides config and TUBESCRIBE_BIND)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Fetch the transcript of a single video
    Transcript {
        /// YouTube video id
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Preferred language code
        #[arg(short, long = "lang", value_name = "LANG")]
        language: Option<String>,

        /// Print raw WebVTT caption markup instead of plain text
        #[arg(long)]
        vtt: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Fetch transcripts for the latest uploads of a channel
    Channel {
        /// Channel handle, with or without the leading @
        #[arg(value_name = "HANDLE")]
        handle: String,

        #[command(flatten)]
        bulk: BulkArgs,
    },

    /// Fetch transcripts for the videos of a playlist
    Playlist {
        /// Playlist id
        #[arg(value_name = "PLAYLIST_ID")]
        list: String,

        #[command(flatten)]
        bulk: BulkArgs,
    },

    /// Show configuration, or write it to the config file for editing
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List the transcript strategies in the order they are tried
    Strategies,
}

#[derive(clap::Args, Clone, Debug)]
pub struct BulkArgs {
    /// Preferred language code
    #[arg(short, long = "lang", value_name = "LANG")]
    pub language: Option<String>,

    /// Maximum number of videos (capped at 500)
    #[arg(short, long, value_name = "COUNT")]
    pub max: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file path (prints to console if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// Pretty-printed JSON, same shape as the HTTP API
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_channel_command() {
        let cli = Cli::parse_from(["tubescribe", "channel", "@mkbhd", "--max", "5", "--lang", "de", "-f", "text"]);
        match cli.command {
            Commands::Channel { handle, bulk } => {
                assert_eq!(handle, "@mkbhd");
                assert_eq!(bulk.max, Some(5));
                assert_eq!(bulk.language.as_deref(), Some("de"));
                assert!(matches!(bulk.format, OutputFormat::Text));
            }
            _ => panic!("expected channel command"),
        }
    }

    #[test]
    fn test_parse_transcript_defaults() {
        let cli = Cli::parse_from(["tubescribe", "transcript", "abc123"]);
        match cli.command {
            Commands::Transcript { video_id, language, vtt, format, output } => {
                assert_eq!(video_id, "abc123");
                assert!(language.is_none());
                assert!(!vtt);
                assert!(matches!(format, OutputFormat::Json));
                assert!(output.is_none());
            }
            _ => panic!("expected transcript command"),
        }
    }
}
