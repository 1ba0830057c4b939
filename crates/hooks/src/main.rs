//! dnsexit-hook - certbot DNS-01 hooks for DNSExit
//!
//! `dnsexit-hook auth` and `dnsexit-hook cleanup` behave exactly like the
//! standalone `auth-hook` and `cleanup-hook` binaries.

use clap::{Parser, Subcommand};
use dnsexit_hooks::{main_with, Command};
use std::process::ExitCode;

/// Certbot manual hooks for DNS-01 validation through DNSExit
#[derive(Parser, Debug)]
#[command(name = "dnsexit-hook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the challenge TXT record and wait for propagation
    Auth,
    /// Delete the challenge TXT record
    Cleanup,
    /// Create, confirm and remove a throwaway record for each domain
    Verify {
        /// Domains to test, e.g. example.com '*.example.com'
        #[arg(required = true, num_args = 1..)]
        domains: Vec<String>,
    },
    /// Resolve every setting and print it with secrets masked
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Auth => Command::Auth,
        Commands::Cleanup => Command::Cleanup,
        Commands::Verify { domains } => Command::Verify { domains },
        Commands::CheckConfig => Command::CheckConfig,
    };

    ExitCode::from(main_with(command, cli.verbose) as u8)
}
