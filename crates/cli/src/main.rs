//! walbctl - control tool for WalB device images
//!
//! Offline administration of formatted LDEV/DDEV image files plus wlog
//! extraction and replay. Runtime-only operations (freeze/melt,
//! checkpoint tuning, lsid events) are library API on
//! `walb_iocore::WalbDevice`.

use clap::{Parser, Subcommand};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "walbctl")]
#[command(about = "WalB block-level WAL control tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh superblock to a log device image
    FormatLdev(commands::format::FormatLdevArgs),
    /// Show device identity and watermarks from the superblock
    Status(commands::status::StatusArgs),
    /// Print one checkpointed lsid
    GetLsid(commands::lsid::GetLsidArgs),
    /// Advance the oldest retained lsid
    SetOldestLsid(commands::lsid::SetOldestLsidArgs),
    /// Print the ring buffer capacity in physical blocks
    GetLogCapacity(commands::log::GetLogCapacityArgs),
    /// Print the checkpointed log usage in physical blocks
    GetLogUsage(commands::log::GetLogUsageArgs),
    /// Extract a lsid window from the ring into a wlog file
    CatWldev(commands::log::CatWldevArgs),
    /// Replay a wlog file onto a data device image
    RedoWlog(commands::log::RedoWlogArgs),
    /// Drop all log content and draw a fresh checksum salt
    ResetWal(commands::device::ResetWalArgs),
    /// Grow the exposed device size
    Resize(commands::device::ResizeArgs),
    /// Print 1 when the checkpointed window exceeds the ring, else 0
    IsLogOverflow(commands::device::IsLogOverflowArgs),
    /// Print the tool version
    Version,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::FormatLdev(args) => commands::format::handle(args, cli.format),
        Commands::Status(args) => commands::status::handle(args, cli.format),
        Commands::GetLsid(args) => commands::lsid::handle_get(args),
        Commands::SetOldestLsid(args) => commands::lsid::handle_set_oldest(args),
        Commands::GetLogCapacity(args) => commands::log::handle_capacity(args),
        Commands::GetLogUsage(args) => commands::log::handle_usage(args),
        Commands::CatWldev(args) => commands::log::handle_cat(args, cli.format),
        Commands::RedoWlog(args) => commands::log::handle_redo(args, cli.format),
        Commands::ResetWal(args) => commands::device::handle_reset_wal(args),
        Commands::Resize(args) => commands::device::handle_resize(args),
        Commands::IsLogOverflow(args) => commands::device::handle_is_log_overflow(args),
        Commands::Version => {
            println!("walbctl {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
