mod commands;

use clap::Parser;
use commands::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run() {
        eprintln!("{} {e}", console::style("error:").red().bold());
        std::process::exit(1);
    }
}
