//! connect6-mcts: a Connect6 MCTS engine.
//!
//! ## Usage
//!
//! - `connect6-mcts` - Show a demo
//! - `connect6-mcts engine` - Serve the line protocol on stdin/stdout
//! - `connect6-mcts demo` - Search a few positions and print the results
//!
//! Logs go to stderr; set the level with `--log-level` or `RUST_LOG`.

use std::io;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use connect6_mcts::connect6::{Connect6, Move};
use connect6_mcts::constants::{DEFAULT_SEED, EXP_FACTOR, N_EXPANSIONS, SIZE};
use connect6_mcts::engine::{Engine, SearchConfig};
use connect6_mcts::tree::{Game, Tree};

/// connect6-mcts: a Connect6 MCTS engine
#[derive(Parser)]
#[command(name = "connect6-mcts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Expansions per search
    #[arg(long, global = true, default_value_t = N_EXPANSIONS)]
    expansions: usize,

    /// UCB exploration factor
    #[arg(long, global = true, default_value_t = EXP_FACTOR)]
    exp_factor: f64,

    /// Seed for rollout tie-breaking
    #[arg(long, global = true, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Stop each search after this many milliseconds
    #[arg(long, global = true)]
    time_limit_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<log::LevelFilter>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the engine protocol on stdin/stdout
    Engine,
    /// Run a simple demo of the engine
    Demo,
}

impl Cli {
    fn search_config(&self) -> SearchConfig {
        SearchConfig {
            expansions: self.expansions,
            exp_factor: self.exp_factor,
            time_limit: self.time_limit_ms.map(Duration::from_millis),
            seed: self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = cli.log_level {
        logger.filter_level(level);
    }
    logger.target(env_logger::Target::Stderr).init();

    let config = cli.search_config();
    match cli.command {
        Some(Commands::Engine) => {
            info!("engine ready: {SIZE}x{SIZE} board, {config:?}");
            let mut engine = Engine::with_config(config);
            engine.run(io::stdin().lock(), io::stdout())?;
        }
        Some(Commands::Demo) | None => run_demo(&config),
    }
    Ok(())
}

fn run_demo(config: &SearchConfig) {
    println!("connect6-mcts: Connect6 MCTS engine ({SIZE}x{SIZE})\n");

    let mut game = Connect6::new(config.seed);
    game.set_exp_factor(config.exp_factor);
    let mut tree: Tree<Move> = Tree::new();

    for turn in 0..4 {
        for _ in 0..config.expansions {
            if tree.root_value().is_decided() {
                break;
            }
            tree.expand(&mut game);
        }
        let Some((mv, value)) = tree.best_move() else {
            break;
        };

        println!("=== Turn {} ({} to play) ===", turn + 1, game.turn());
        println!("Searched {} nodes, best {mv} ({value})", tree.len());
        let mut children: Vec<_> = tree.children().collect();
        children.sort_by(|a, b| (-a.1).mean(a.2).total_cmp(&(-b.1).mean(b.2)).reverse());
        for (child, value, sims) in children.iter().take(5) {
            println!("  {child:<8} n={sims:<4} v={}", -*value);
        }

        let won = game.play_move(mv);
        tree.commit_move(mv);
        println!("{game}");
        if won || game.is_over() {
            break;
        }
    }
}
