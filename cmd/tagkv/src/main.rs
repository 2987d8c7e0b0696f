//! tagkv CLI - inspect and edit tagkv stores from the command line.

use clap::{Parser, Subcommand};

mod commands;

use commands::{
    ClearCommand, ConfigCommand, CountCommand, DeleteCommand, DumpCommand, ExpireCommand,
    GetCommand, LatestCommand, PutCommand, ScanCommand,
};

/// tagkv CLI - inspect and edit tagkv stores.
///
/// A store is a SQLite file or a PostgreSQL table holding (key, value, tag)
/// entries. Stores are selected through contexts kept in
/// ~/.tagkv/tagkv/config.yaml, similar to kubectl's context management.
#[derive(Parser)]
#[command(name = "tagkv")]
#[command(about = "Ordered key-value store CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.tagkv/tagkv/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Context name to use
    #[arg(short = 'c', long, global = true)]
    pub context: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Insert or replace an entry
    Put(PutCommand),
    /// Read an entry
    Get(GetCommand),
    /// Delete entries by key or tag
    Delete(DeleteCommand),
    /// Delete entries whose tag sorts before a watermark
    Expire(ExpireCommand),
    /// Delete every entry
    Clear(ClearCommand),
    /// Count entries and report the key range
    Count(CountCommand),
    /// Scan entries from a key bound
    Scan(ScanCommand),
    /// Show the entries with the greatest keys
    Latest(LatestCommand),
    /// Dump every entry holding a JSON value
    Dump(DumpCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    }

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli),
        Commands::Put(cmd) => cmd.run(&cli),
        Commands::Get(cmd) => cmd.run(&cli),
        Commands::Delete(cmd) => cmd.run(&cli),
        Commands::Expire(cmd) => cmd.run(&cli),
        Commands::Clear(cmd) => cmd.run(&cli),
        Commands::Count(cmd) => cmd.run(&cli),
        Commands::Scan(cmd) => cmd.run(&cli),
        Commands::Latest(cmd) => cmd.run(&cli),
        Commands::Dump(cmd) => cmd.run(&cli),
    }
}
