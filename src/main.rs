mod common;
mod ui;
mod video;

use std::path::PathBuf;

use clap::{Parser, ValueHint};

use crate::ui::prelude::*;
use crate::video::{EngineCommands, handle_engine_command};

/// Short-form marketing video production
#[derive(Parser, Debug)]
#[command(name = "content-engine", author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for messages
    #[arg(long = "output", value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file to use instead of the per-user one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: EngineCommands,
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(err) = handle_engine_command(cli.command, cli.config.as_deref()) {
        emit(
            Level::Error,
            "engine.failed",
            &format!("Error: {err:#}"),
            None,
        );
        std::process::exit(1);
    }
}
