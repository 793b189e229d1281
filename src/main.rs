use clap::Parser;
use quantpipe::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
