// CLI binary entry point for oggtag
//
// Reads and edits Vorbis comments and inspects OGG page/packet structure.

mod cli;

use clap::Parser;
use std::process;

use cli::Config;

fn main() {
    let config = Config::parse();
    cli::init_logging(&config);

    if let Err(e) = cli::run(&config) {
        eprintln!("✗ {:#}", e);
        process::exit(1);
    }
}
