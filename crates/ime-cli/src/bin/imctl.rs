use std::path::Path;

use clap::{Parser, Subcommand};

use ime_cli::commands::{client_ops, serve_ops, settings_ops};

#[derive(Parser)]
#[command(name = "imctl", about = "IME client diagnostics")]
struct Cli {
    /// Write JSON trace logs to this directory (needs the `trace` feature)
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the in-memory engine over TCP
    Serve {
        /// Port to listen on (127.0.0.1)
        #[arg(long)]
        port: u16,
        /// Stop after this many calls
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Type keys through a client session and print the committed text
    Send {
        /// Settings TOML file (defaults are used otherwise)
        #[arg(long)]
        settings: Option<String>,
        /// Characters to type
        keys: String,
    },
    /// Show which transport the settings select
    Probe {
        /// Settings TOML file
        #[arg(long)]
        settings: Option<String>,
    },
    /// Print the default settings TOML
    SettingsExport,
    /// Validate a settings TOML file
    SettingsValidate {
        /// Settings TOML file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Some(dir) = &cli.log_dir {
        if let Err(e) = ime_client::trace_init::init_tracing(Path::new(dir)) {
            eprintln!("Error: cannot open log directory {dir}: {e}");
            std::process::exit(1);
        }
    }

    match cli.command {
        Command::Serve { port, limit } => serve_ops::serve(port, limit),
        Command::Send { settings, keys } => client_ops::send(settings.as_deref(), &keys),
        Command::Probe { settings } => client_ops::probe(settings.as_deref()),
        Command::SettingsExport => settings_ops::settings_export(),
        Command::SettingsValidate { file } => settings_ops::settings_validate(&file),
    }
}
