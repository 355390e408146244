//! # fedlic CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fedlic_cli::check::{run_check, CheckArgs};
use fedlic_cli::signing::{run_keygen, run_sign, KeygenArgs, SignArgs};
use fedlic_cli::verify::{run_verify, VerifyArgs};

/// fedlic license tooling
///
/// Issues, signs and verifies license records, and checks the license
/// decision of a running fedlic server.
#[derive(Parser, Debug)]
#[command(name = "fedlic", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an RSA issuer key pair.
    Keygen(KeygenArgs),

    /// Sign a license record with an issuer private key.
    Sign(SignArgs),

    /// Verify a license record against a trust certificate.
    Verify(VerifyArgs),

    /// Check the license decision of a running server.
    Check(CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::Sign(args) => run_sign(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::Check(args) => run_check(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
