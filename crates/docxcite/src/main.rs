//! docxcite CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

use commands::config::ConfigArgs;
use commands::process::ProcessArgs;
use settings::Settings;

#[derive(Parser)]
#[command(name = "docxcite")]
#[command(version)]
#[command(about = "Finalize Zotero citations in .docx documents", long_about = None)]
struct Cli {
    /// Settings file (defaults to docxcite/settings.json in the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update and show the stored Zotero credentials and citation style
    Config {
        /// Whitespace-separated Zotero user ids
        #[arg(long)]
        user_ids: Option<String>,

        /// Whitespace-separated Zotero group ids
        #[arg(long)]
        group_ids: Option<String>,

        /// Zotero API key
        #[arg(long)]
        api_key: Option<String>,

        /// Path or URL of a CSL style (empty to clear)
        #[arg(long)]
        style: Option<String>,

        /// Print the settings after updating them
        #[arg(long)]
        show: bool,
    },

    /// Replace citation placeholders with formatted citations
    Process {
        /// .docx files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write processed documents to DIR
        #[arg(short = 'o', long, default_value = "out")]
        out_dir: PathBuf,

        /// Write the combined bibliography (HTML) to FILE
        #[arg(long, value_name = "FILE")]
        bibliography: Option<PathBuf>,

        /// Directory holding locales-<lang>.xml files
        #[arg(long, value_name = "DIR")]
        locales: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docxcite=info,docxcite_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings_path = match cli.settings {
        Some(path) => path,
        None => Settings::default_path()?,
    };

    match cli.command {
        Commands::Config {
            user_ids,
            group_ids,
            api_key,
            style,
            show,
        } => commands::config::execute(ConfigArgs {
            settings_path,
            user_ids,
            group_ids,
            api_key,
            style,
            show,
        }),
        Commands::Process {
            files,
            out_dir,
            bibliography,
            locales,
        } => commands::process::execute(ProcessArgs {
            settings_path,
            files,
            out_dir,
            bibliography,
            locales,
        }),
    }
}
