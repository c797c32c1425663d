use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::actions::Action;
use crate::agent::{normalize_table, Agent, AgentSnapshot};
use crate::cards::parse_board;
use crate::display::{
    board_display, print_error, print_section, print_success, rank_table, strategy_table,
};
use crate::error::PokerResult;
use crate::hand_evaluator::{evaluate_rank, rank_class};
use crate::trainer::{self, TrainConfig};

#[derive(Parser)]
#[command(
    name = "holdem-cfr",
    version = "1.0.0",
    about = "Heads-up no-limit hold'em blueprint training with counterfactual regret minimization."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent by self-play
    Train {
        #[command(subcommand)]
        command: TrainCommand,
    },
    /// Evaluate 5 to 7 cards
    Rank {
        /// Hole cards or a full hand (e.g., AsKs or AsKsQsJsTs)
        cards: String,
        /// Board cards (e.g., QsJsTs)
        #[arg(short, long)]
        board: Option<String>,
    },
    /// Print the strategy stored in an agent snapshot
    Strategy {
        /// Path to an agent.json written during training
        agent_path: PathBuf,
        /// Show the preflop action counts instead of the dumped strategy
        #[arg(long)]
        preflop: bool,
    },
}

#[derive(Subcommand)]
enum TrainCommand {
    /// Train an agent from scratch
    Start(TrainConfig),
    /// Continue training from a previous run's server.json
    Resume {
        #[arg(long, default_value = "./server.json")]
        server_config_path: PathBuf,
    },
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    dispatch(cli);
}

pub fn run_with_args(args: Vec<String>) {
    let cli = Cli::parse_from(args);
    dispatch(cli);
}

fn dispatch(cli: Cli) {
    let result = match cli.command {
        Commands::Train { command } => match command {
            TrainCommand::Start(config) => cmd_train(trainer::start(&config)),
            TrainCommand::Resume { server_config_path } => {
                cmd_train(trainer::resume(&server_config_path))
            }
        },
        Commands::Rank { cards, board } => cmd_rank(&cards, board.as_deref()),
        Commands::Strategy {
            agent_path,
            preflop,
        } => cmd_strategy(&agent_path, preflop),
    };
    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn cmd_train(result: PokerResult<Agent<Action>>) -> PokerResult<()> {
    let agent = result?;
    print_section("Preflop strategy", &strategy_table(&agent.average_strategy()));
    print_success(&format!(
        "Training finished with {} info sets.",
        agent.n_info_sets()
    ));
    Ok(())
}

fn cmd_rank(cards: &str, board: Option<&str>) -> PokerResult<()> {
    let hand = parse_board(cards)?;
    let board = match board {
        Some(b) => parse_board(b)?,
        None => Vec::new(),
    };
    let rank = evaluate_rank(&hand, &board)?;
    let category = rank_class(rank)?;

    println!();
    println!("  Hand:  {}", board_display(&hand));
    if !board.is_empty() {
        println!("  Board: {}", board_display(&board));
    }
    println!();
    println!("{}", rank_table(rank, category));
    Ok(())
}

fn cmd_strategy(agent_path: &Path, preflop: bool) -> PokerResult<()> {
    let snapshot = AgentSnapshot::load(agent_path)?;
    let table = if preflop {
        &snapshot.preflop_strategy
    } else {
        &snapshot.strategy
    };
    let normalized = normalize_table(table);
    let title = format!(
        "{} strategy at iteration {}",
        if preflop { "Preflop" } else { "Blueprint" },
        snapshot.timestep
    );
    if normalized.is_empty() {
        println!("{}", "  (no info sets recorded yet)".dimmed());
        return Ok(());
    }
    print_section(&title, &strategy_table(&normalized));
    Ok(())
}
