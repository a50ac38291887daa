//! Web Page Builder Binary

use std::process;
use webproject::Cli;

fn main() {
    let mut cli = Cli::new();
    if let Err(e) = cli.run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
