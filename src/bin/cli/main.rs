mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use jonmem_lib::training::{Direction, SessionMode};

#[derive(Parser)]
#[command(name = "jonmem-cli", about = "Vocabulary trainer", version)]
struct Cli {
    /// Data directory (default: platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Trainer config file (default: config.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DirectionArg {
    DeToEn,
    EnToDe,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::DeToEn => Direction::DeToEn,
            DirectionArg::EnToDe => Direction::EnToDe,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ModeArg {
    Introduce,
    Review,
}

impl From<ModeArg> for SessionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Introduce => SessionMode::Introduce,
            ModeArg::Review => SessionMode::Review,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Import topics and cards from a YAML seed file
    Import {
        /// Path to the YAML file
        file: PathBuf,
    },

    /// Show learned topics and introduction progress
    Topics {
        /// Target language (default: all languages)
        #[arg(long)]
        lang: Option<String>,
        #[arg(long, value_enum, default_value = "de-to-en")]
        direction: DirectionArg,
    },

    /// Review topic filter
    #[command(subcommand)]
    Filter(FilterCommand),

    /// Run an interactive training session
    Train {
        #[arg(value_enum)]
        mode: ModeArg,
        #[arg(long, value_enum, default_value = "de-to-en")]
        direction: DirectionArg,
        /// Only cards of this target language
        #[arg(long)]
        lang: Option<String>,
        /// Review only these topics, or introduce this one topic (id or name)
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Seed for reproducible card selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Training counts by day
    Log {
        /// Number of most recent days to show
        #[arg(long, default_value = "14")]
        days: usize,
    },
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Restrict reviews to these topics (id or name)
    Set {
        #[arg(required = true)]
        topics: Vec<String>,
    },

    /// Review all learned topics again
    Clear,

    /// Show the saved filter
    Show,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.data_dir.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Command::Import { file } => {
            commands::import::run(&app, &file, &cli.format)?;
        }
        Command::Topics { lang, direction } => {
            commands::topics::run(&app, lang.as_deref(), direction.into(), &cli.format)?;
        }
        Command::Filter(subcmd) => match subcmd {
            FilterCommand::Set { topics } => {
                commands::filter::run_set(&app, &topics, &cli.format)?;
            }
            FilterCommand::Clear => {
                commands::filter::run_clear(&app, &cli.format)?;
            }
            FilterCommand::Show => {
                commands::filter::run_show(&app, &cli.format)?;
            }
        },
        Command::Train {
            mode,
            direction,
            lang,
            topics,
            seed,
        } => {
            commands::train::run(
                &app,
                mode.into(),
                direction.into(),
                lang,
                &topics,
                seed,
                use_color,
            )?;
        }
        Command::Log { days } => {
            commands::history::run(&app, days, &cli.format)?;
        }
    }

    Ok(())
}
