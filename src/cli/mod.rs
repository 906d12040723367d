//! CLI module for Syllabus.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Syllabus - Course Materials Q&A
///
/// Ask questions about indexed course materials. Answers come from a
/// tool-calling language model that searches lesson content and course
/// outlines on your behalf.
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SYLLABUS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question about the course materials
    Ask {
        /// The question to ask
        question: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start an interactive chat session
    Chat,

    /// Load course files (a JSON file or a directory of them)
    Load {
        /// Path to a course file or directory
        path: String,

        /// Remove all indexed courses before loading
        #[arg(long)]
        clear: bool,
    },

    /// List indexed courses
    Courses {
        /// Print the outline of one course instead
        #[arg(short, long)]
        outline: Option<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Course file or directory to index before accepting requests
        #[arg(long)]
        load: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}
