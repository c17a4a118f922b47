use clap::Parser;
use patch_stack::cli::Cli;
use std::process;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run() {
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}
