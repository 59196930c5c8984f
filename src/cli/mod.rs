// CLI module for oggtag
//
// Command-line front end over the oggtag library. Compiled only into the binary.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::run;
pub use config::Config;

use env_logger::Env;
use log::LevelFilter;

/// Set up env_logger; `-q` and `-v` take precedence over `RUST_LOG`.
pub fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if config.quiet {
        builder.filter_level(LevelFilter::Error);
    } else {
        match config.verbose {
            0 => {}
            1 => {
                builder.filter_level(LevelFilter::Debug);
            }
            _ => {
                builder.filter_level(LevelFilter::Trace);
            }
        }
    }
    builder.format_timestamp(None).init();
}
