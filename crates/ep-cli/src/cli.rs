//! CLI argument definitions for `easypaper`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "easypaper",
    version,
    about = "EasyPaper - local version history and builds for LaTeX projects",
    long_about = "Record snapshots of a LaTeX project, compile it with tectonic or latexmk,\n\
                  and restore or compare earlier versions.\n\n\
                  History lives in <PROJECT>/.control; build settings in\n\
                  <PROJECT>/.easypaper/project.toml."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project directory (default: current directory).
    #[arg(short = 'C', long = "project", value_name = "DIR", default_value = ".", global = true)]
    pub project: PathBuf,

    /// Print the raw response envelope as JSON.
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enable version history for the project.
    Init,

    /// Record the current content of a file as a save.
    Save {
        /// File path relative to the project.
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Record all tracked files as one commit.
    Commit {
        /// Commit message.
        #[arg(short = 'm', long = "message")]
        message: Option<String>,

        /// Mark the commit as belonging to a failed build.
        #[arg(long = "build-failed")]
        build_failed: bool,
    },

    /// List commits, oldest first.
    History {
        /// Show only the most recent N commits.
        #[arg(long = "limit", value_name = "N")]
        limit: Option<usize>,
    },

    /// Overwrite project files with their content at a commit.
    Restore {
        #[arg(value_name = "COMMIT")]
        commit: String,
    },

    /// Show how the working copy differs from a commit.
    Diff {
        #[arg(value_name = "COMMIT")]
        commit: String,
    },

    /// Compile the project and record the outcome.
    Compile {
        /// Treat the request as a preview refresh.
        #[arg(long = "auto")]
        auto: bool,
    },

    /// Remove build output.
    Clean,

    /// Delete snapshots no commit references.
    Gc,

    /// Check every snapshot against its hash.
    Verify,

    /// Map between PDF positions and source lines.
    #[command(subcommand)]
    Synctex(SynctexCommand),
}

#[derive(Subcommand)]
pub enum SynctexCommand {
    /// PDF position to source line.
    Edit {
        #[arg(long = "page")]
        page: u32,
        #[arg(long = "x")]
        x: f64,
        #[arg(long = "y")]
        y: f64,
    },

    /// Source line to PDF position.
    View {
        #[arg(value_name = "FILE")]
        file: String,
        #[arg(long = "line")]
        line: u32,
        #[arg(long = "column", default_value_t = 0)]
        column: u32,
    },
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
