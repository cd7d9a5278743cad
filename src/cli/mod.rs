use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage cross-platform builder instances
    Builder {
        #[command(subcommand)]
        command: BuilderCommands,
    },

    /// Build a multi-platform image into an OCI layout archive
    Build {
        /// Path to the build context directory
        #[arg(value_name = "DIRECTORY")]
        context: PathBuf,

        /// Image reference to stamp on the build (e.g. registry.example.com/app:v1)
        #[arg(short, long)]
        image: String,

        /// Target platforms (e.g. linux/386, linux/amd64, linux/arm64)
        /// Can be specified multiple times or as a comma-separated list
        #[arg(long, value_delimiter = ',')]
        platform: Option<Vec<String>>,

        /// Builder instance to build with
        #[arg(long)]
        builder: Option<String>,

        /// Where to write the archive; derived from the image name by default
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Log in to a registry with short-lived credentials
    Login {
        /// Registry hostname (e.g. 123456789012.dkr.ecr.us-east-1.amazonaws.com)
        registry: String,

        /// Username to authenticate with
        #[arg(short, long)]
        username: Option<String>,

        /// Read the password from stdin instead of the configured credential command
        #[arg(long)]
        password_stdin: bool,
    },

    /// Push an OCI layout archive to a registry
    Push {
        /// Archive produced by `ferry build`
        archive: PathBuf,

        /// Fully qualified image reference to push to
        image: String,
    },

    /// List the platforms a pushed image provides
    Platforms {
        /// Image reference to inspect
        image: String,
    },

    /// Build and push in one pass
    Release {
        /// Path to the build context directory
        #[arg(value_name = "DIRECTORY")]
        context: PathBuf,

        /// Fully qualified image reference to push to
        image: String,

        /// Target platforms (e.g. linux/386, linux/amd64, linux/arm64)
        #[arg(long, value_delimiter = ',')]
        platform: Option<Vec<String>>,

        /// Builder instance to build with
        #[arg(long)]
        builder: Option<String>,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum BuilderCommands {
    /// Create a builder instance
    Create {
        /// Builder name; the configured default when omitted
        name: Option<String>,

        /// Builder driver
        #[arg(long, default_value = "docker-container")]
        driver: String,

        /// Platforms to pin the builder to
        #[arg(long, value_delimiter = ',')]
        platform: Vec<String>,

        /// Make the new instance the default builder
        #[arg(long = "use")]
        set_default: bool,
    },

    /// Start a builder and report the platforms it supports
    Bootstrap {
        /// Builder name; the configured default when omitted
        name: Option<String>,
    },

    /// Show a builder's driver, status, and platforms
    Inspect {
        /// Builder name; the configured default when omitted
        name: Option<String>,
    },

    /// Remove a builder instance
    Rm {
        /// Builder name; the configured default when omitted
        name: Option<String>,
    },
}
