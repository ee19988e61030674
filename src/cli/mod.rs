//! Command line entry points

pub mod serve;

use clap::{Parser, Subcommand};

/// Knowledge Gateway - search and ingest documents across Flowise, Supabase and Pinecone
#[derive(Parser)]
#[command(name = "knowledge-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve(serve::ServeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["knowledge-gateway", "serve", "--port", "9000"]).unwrap();

        let Command::Serve(args) = cli.command;
        assert_eq!(args.port, Some(9000));
        assert!(args.host.is_none());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["knowledge-gateway"]).is_err());
    }
}
