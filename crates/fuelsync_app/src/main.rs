mod platform;

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use fuelsync_core::{normalize_server_url, SyncMode, TaskKind};

use platform::config::{ClientConfig, GlobalArgs};
use platform::Plan;

/// Terminal client for the fuel-management report server.
#[derive(Parser, Debug)]
#[command(name = "fuelsync", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the server answers.
    Probe,
    /// Remember a server address for later runs.
    SetServer { url: String },
    /// Upload a source spreadsheet (.xls or .xlsx).
    Upload {
        #[arg(short = 't', long = "type")]
        kind: TaskKind,
        file: PathBuf,
    },
    /// Start a summarisation task and follow it until it ends.
    Run {
        #[arg(short = 't', long = "type")]
        kind: TaskKind,
        /// Load the result preview once the task is done.
        #[arg(long)]
        preview: bool,
    },
    /// Show the generated report.
    Preview {
        #[arg(short = 't', long = "type")]
        kind: TaskKind,
        /// Print every sheet instead of only the first.
        #[arg(long)]
        all: bool,
        /// Print the table markup as received.
        #[arg(long)]
        html: bool,
    },
    /// Save the generated report workbook.
    Download {
        #[arg(short = 't', long = "type")]
        kind: TaskKind,
        /// Directory to write into.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Follow the server log stream.
    Watch,
    /// Interactive session; type `help` for commands.
    Console,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ClientConfig::load(&cli.global)?;
    platform::logging::initialize(&config.log_file, cli.global.verbose);

    let plan = match cli.command.unwrap_or(Commands::Console) {
        Commands::Probe => Plan::probe(),
        Commands::SetServer { url } => {
            let url = normalize_server_url(&url).map_err(|err| anyhow!("invalid address: {err}"))?;
            Plan::set_server(url)
        }
        Commands::Upload { kind, file } => Plan::upload(kind, file),
        Commands::Run { kind, preview } => Plan::run(kind, preview),
        Commands::Preview { kind, all, html } => {
            config.render.all_sheets = all;
            config.render.raw_markup = html;
            Plan::preview(kind)
        }
        Commands::Download { kind, out } => {
            if let Some(out) = out {
                config.output_dir = out;
            }
            Plan::download(kind)
        }
        Commands::Watch => {
            anyhow::ensure!(
                config.mode == SyncMode::Stream,
                "watch needs the log stream; drop --mode polling"
            );
            Plan::watch()
        }
        Commands::Console => Plan::console(),
    };

    platform::run(config, plan)
}
