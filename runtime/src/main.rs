// Copyright 2026 ModelRelay Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use relay_runtime::cli::{self, output, settings_cmd::SettingsEdit};
use relay_runtime::config::RelayConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "ModelRelay: copy model metadata from a gallery page into a creation form",
    version,
    after_help = "Run 'relay <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Store file (default: ~/.model-relay/relay.db, or RELAY_STORE)
    #[arg(long, global = true)]
    store: Option<String>,

    /// DevTools websocket URL of a running browser (or RELAY_DEVTOOLS_URL)
    #[arg(long, global = true)]
    connect: Option<String>,

    /// Show the launched browser window
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a model page and save it as the current clip
    Copy {
        /// Source model page URL
        url: String,
    },
    /// Fill the creation wizard with the current clip
    Paste {
        /// Target wizard URL
        url: String,
        /// Paste this record file instead of the saved clip
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Print the current clip
    Show,
    /// View or edit settings
    Settings(SettingsArgs),
    /// Answer JSON requests on stdin
    Serve,
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Args)]
struct SettingsArgs {
    /// Translate non-English titles and descriptions
    #[arg(long, conflicts_with = "no_translate")]
    translate: bool,
    /// Keep titles and descriptions as found
    #[arg(long)]
    no_translate: bool,
    /// Translation target language code (e.g. "en")
    #[arg(long)]
    target_lang: Option<String>,
    /// Comma-separated words stripped from titles
    #[arg(long)]
    ignore_words: Option<String>,
    /// Wallpaper opacity between 0 and 1
    #[arg(long)]
    wallpaper_opacity: Option<f64>,
    /// Remove the wallpaper image
    #[arg(long)]
    clear_wallpaper: bool,
}

impl SettingsArgs {
    fn edit(&self) -> SettingsEdit {
        let translate = match (self.translate, self.no_translate) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        SettingsEdit {
            translate,
            target_lang: self.target_lang.clone(),
            ignore_words: self.ignore_words.clone(),
            wallpaper_opacity: self.wallpaper_opacity,
            clear_wallpaper: self.clear_wallpaper,
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "relay=debug,model_relay=debug"
    } else {
        "relay=info,model_relay=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("RELAY_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("RELAY_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("RELAY_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("RELAY_NO_COLOR", "1");
    }
    init_tracing(cli.verbose, cli.json);

    let config = RelayConfig::resolve(cli.store.as_deref(), cli.connect.as_deref(), cli.headful);

    let result = match &cli.command {
        Commands::Copy { url } => cli::copy_cmd::run(&config, url).await,
        Commands::Paste { url, record } => {
            cli::paste_cmd::run(&config, url, record.as_deref()).await
        }
        Commands::Show => cli::show_cmd::run(&config).await,
        Commands::Settings(args) => cli::settings_cmd::run(&config, &args.edit()).await,
        Commands::Serve => cli::serve::run(&config).await,
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "relay", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !output::is_quiet() {
            let s = output::Styled::new();
            eprintln!("  {} {e:#}", s.fail_sym());
        }
        std::process::exit(1);
    }

    result
}
