//! CLI command definitions
//!
//! Defines the clap commands for the uiflow CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more flow files against the automation server
    Run {
        /// Flow files (YAML), executed in order, one session each
        #[arg(required = true)]
        flows: Vec<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        /// Set a flow variable: --var email=me@example.com
        /// Can be specified multiple times
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Directory for screenshots
        #[arg(long)]
        results: Option<PathBuf>,

        /// Don't take screenshots
        #[arg(long)]
        no_screenshots: bool,

        /// Write a JSON report of every flow and step
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate flow files and print the steps they would run
    Check {
        /// Flow files (YAML)
        #[arg(required = true)]
        flows: Vec<PathBuf>,

        /// Set a flow variable: --var email=me@example.com
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Config file (default: per-user config.toml)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Check that the automation server is reachable and ready
    Status {
        /// Config file (default: per-user config.toml)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Server URL, overriding the config file
        #[arg(long)]
        server: Option<String>,
    },
}

/// Where and what to launch; each flag overrides the config file
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Config file (default: per-user config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Automation server URL
    #[arg(long)]
    pub server: Option<String>,

    /// Application binary to install and launch
    #[arg(long)]
    pub app: Option<PathBuf>,

    /// Package of an already-installed application
    #[arg(long)]
    pub package: Option<String>,

    /// Activity to launch within the package
    #[arg(long)]
    pub activity: Option<String>,

    /// Device name
    #[arg(long)]
    pub device: Option<String>,
}
