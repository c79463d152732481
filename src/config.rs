use crate::track::AssemblySettings;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "bamtrack")]
#[command(about = "Alignment track and consensus server for genome browsers")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "BAMTRACK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "BAMTRACK_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory containing BAM and FASTA files
    #[arg(long, env = "BAMTRACK_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Serve files from this base URL instead of the data directory
    #[arg(long, env = "BAMTRACK_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Enable CORS for all origins
    #[arg(long, env = "BAMTRACK_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Sub-windows processed in parallel per query
    #[arg(long, env = "BAMTRACK_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Reads consumed between cancellation checks
    #[arg(long, env = "BAMTRACK_BATCH_SIZE", default_value = "256")]
    pub batch_size: usize,

    /// Skipped regions must be longer than this to be reported as splice junctions
    #[arg(long, env = "BAMTRACK_MIN_SPLICE_LENGTH", default_value = "0")]
    pub min_splice_length: u32,

    /// Windows narrower than this are not split across workers
    #[arg(long, env = "BAMTRACK_MIN_SPLIT_WIDTH", default_value = "100000")]
    pub min_split_width: u64,

    /// Widest window a single query may resolve to
    #[arg(long, env = "BAMTRACK_MAX_WINDOW_WIDTH", default_value = "10000000")]
    pub max_window_width: u64,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn assembly_settings(&self) -> AssemblySettings {
        AssemblySettings {
            workers: self.workers.max(1),
            batch_size: self.batch_size.max(1),
            min_splice_length: self.min_splice_length,
            min_split_width: self.min_split_width,
            max_window_width: self.max_window_width.max(1),
        }
    }
}
