//! regionfs CLI - create, inspect and edit regionfs images.

mod commands;
mod observability;

use anyhow::Result;
use clap::{Parser, Subcommand};
use observability::{LogFormat, TracingConfig, init_tracing};
use regionfs_core::Timespec;
use std::path::PathBuf;

/// regionfs - a position-independent filesystem in a single file.
#[derive(Parser)]
#[command(name = "regionfs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format: json, pretty or compact
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Path to the image file
    #[arg(short, long, env = "REGIONFS_IMAGE", global = true, default_value = "regionfs.img")]
    image: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and format a new image
    Format {
        /// Image size in bytes
        #[arg(short, long, default_value_t = regionfs_core::image::DEFAULT_IMAGE_SIZE)]
        size: u64,

        /// Overwrite an existing image
        #[arg(short, long)]
        force: bool,
    },

    /// List a directory
    Ls {
        /// Directory path
        #[arg(default_value = "/")]
        path: String,

        /// Show attributes for each entry
        #[arg(short, long)]
        long: bool,
    },

    /// Show attributes of an entry
    Stat {
        /// Entry path
        path: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a directory
    Mkdir {
        /// Directory path
        path: String,

        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Create an empty file
    Touch {
        /// File path
        path: String,
    },

    /// Remove a file
    Rm {
        /// File path
        path: String,
    },

    /// Remove an empty directory
    Rmdir {
        /// Directory path
        path: String,
    },

    /// Move or rename an entry
    Mv {
        /// Source path
        from: String,

        /// Destination path
        to: String,
    },

    /// Copy a host file into the image
    Put {
        /// Host file to read
        host: PathBuf,

        /// Destination path inside the image
        path: String,
    },

    /// Print a file's contents
    Cat {
        /// File path
        path: String,

        /// Byte offset to start reading at
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Set a file's length
    Truncate {
        /// File path
        path: String,

        /// New length in bytes
        #[arg(short, long)]
        len: u64,
    },

    /// Set access and modification times (SECONDS[.FRACTION])
    Settime {
        /// Entry path
        path: String,

        /// Access time
        #[arg(long)]
        atime: Timespec,

        /// Modification time
        #[arg(long)]
        mtime: Timespec,
    },

    /// Show space usage
    Df {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the image's internal consistency
    Check {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Apply command-line logging overrides on top of the environment.
fn logging_config(base: TracingConfig, verbosity: u8, format: Option<LogFormat>) -> TracingConfig {
    let mut config = match verbosity {
        0 => base,
        1 => base.with_filter("info"),
        2 => base.with_filter("debug"),
        _ => base.with_filter("trace"),
    };
    if let Some(format) = format {
        config = config.with_format(format);
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&logging_config(
        TracingConfig::from_env("warn"),
        cli.verbose,
        cli.log_format,
    ))?;
    let image = cli.image.as_path();

    match cli.command {
        Commands::Format { size, force } => commands::image::format(image, size, force),
        Commands::Ls { path, long } => commands::entry::ls(image, &path, long),
        Commands::Stat { path, json } => commands::entry::stat(image, &path, json),
        Commands::Mkdir { path, parents } => commands::entry::mkdir(image, &path, parents),
        Commands::Touch { path } => commands::entry::touch(image, &path),
        Commands::Rm { path } => commands::entry::rm(image, &path),
        Commands::Rmdir { path } => commands::entry::rmdir(image, &path),
        Commands::Mv { from, to } => commands::entry::mv(image, &from, &to),
        Commands::Settime { path, atime, mtime } => {
            commands::entry::settime(image, &path, atime, mtime)
        }
        Commands::Put { host, path } => commands::data::put(image, &host, &path),
        Commands::Cat { path, offset } => commands::data::cat(image, &path, offset),
        Commands::Truncate { path, len } => commands::data::truncate(image, &path, len),
        Commands::Df { json } => commands::image::df(image, json),
        Commands::Check { json } => commands::image::check(image, json),
    }
}
