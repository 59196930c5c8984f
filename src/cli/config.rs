// CLI configuration
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// oggtag - OGG Vorbis comment CLI tool
#[derive(Parser, Debug)]
#[command(name = "oggtag")]
#[command(about = "Read and edit Vorbis comments in OGG files", long_about = None)]
#[command(version)]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG is honored otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Pretty,
    /// Compact JSON
    Json,
    /// Key-value pairs
    KeyValue,
    /// Table format
    Table,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read comments from OGG Vorbis file(s); wildcards are expanded
    Read {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,

        /// Comment fields to display (comma-separated)
        #[arg(long)]
        fields: Option<String>,

        /// Output to file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Change comments of an OGG Vorbis file
    Write {
        #[arg(value_name = "FILE")]
        file: String,

        /// Replace a field: FIELD=value (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Append a value: FIELD=value (repeatable)
        #[arg(long = "add", value_name = "FIELD=VALUE")]
        add: Vec<String>,

        /// Remove every value of a field (repeatable)
        #[arg(long = "remove", value_name = "FIELD")]
        remove: Vec<String>,

        /// Drop all existing comments first
        #[arg(long)]
        clear: bool,

        /// Replace the vendor string
        #[arg(long)]
        vendor: Option<String>,

        /// Write to this path instead of rewriting FILE
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Embed a JPEG or PNG as a METADATA_BLOCK_PICTURE comment
    SetCover {
        #[arg(value_name = "FILE")]
        file: String,

        /// Image file path
        #[arg(short, long)]
        image: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Picture type code (3 = front cover)
        #[arg(long, default_value_t = 3)]
        picture_type: u32,

        /// Keep existing pictures instead of replacing them
        #[arg(long)]
        keep_existing: bool,

        /// Write to this path instead of rewriting FILE
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export embedded pictures
    ExportCover {
        #[arg(value_name = "FILE")]
        file: String,

        /// Output directory for cover images
        #[arg(short, long)]
        output: String,

        /// Cover index (for files with multiple covers)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// List the pages of a file
    Pages {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// List the packets of one logical stream
    Packets {
        #[arg(value_name = "FILE")]
        file: String,

        /// Stream serial (defaults to the first stream)
        #[arg(long, value_parser = parse_serial)]
        serial: Option<u32>,
    },
}

/// Accepts decimal or 0x-prefixed hex.
fn parse_serial(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid serial '{}': {}", s, e))
}
