//! Engine side of the line protocol.
//!
//! The engine keeps one game and one search tree in step: every `move` is
//! played on the game and committed in the tree so that search results
//! below the new position survive. `go` and `expand` grow the tree and
//! report the best move.
//!
//! ## Example
//!
//! ```ignore
//! use connect6_mcts::engine::Engine;
//! let mut engine = Engine::new();
//! engine.run(std::io::stdin().lock(), std::io::stdout())?;
//! ```

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::board::{Color, Scoreable};
use crate::connect6::{Connect6, Move};
use crate::constants::{DEFAULT_SEED, EXP_FACTOR, N_EXPANSIONS, PROTOCOL_DECISIVE, PROTOCOL_WIN_SCORE};
use crate::protocol::{BestMove, Command, Event, Info};
use crate::tree::{Game, Tree};
use crate::value::{Outcome, Value};

/// Search budget and tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Expansions per `go`.
    pub expansions: usize,
    pub exp_factor: f64,
    /// Stop a search early once this much time has passed.
    pub time_limit: Option<Duration>,
    /// Seed for rollout tie-breaking.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            expansions: N_EXPANSIONS,
            exp_factor: EXP_FACTOR,
            time_limit: None,
            seed: DEFAULT_SEED,
        }
    }
}

/// Protocol engine state.
pub struct Engine {
    game: Connect6,
    tree: Tree<Move>,
    config: SearchConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(SearchConfig::default())
    }

    pub fn with_config(config: SearchConfig) -> Self {
        Self {
            game: new_game(&config),
            tree: Tree::new(),
            config,
        }
    }

    pub fn game(&self) -> &Connect6 {
        &self.game
    }

    pub fn tree(&self) -> &Tree<Move> {
        &self.tree
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Serve commands from `input` until `quit` or end of input.
    ///
    /// Blank lines and `#` comments are skipped. Malformed commands are
    /// answered with an `error` event.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            trace!("<< {line}");

            let events = match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command),
                Err(e) => {
                    warn!("{e}");
                    vec![Event::Error(e.to_string())]
                }
            };

            for event in &events {
                trace!(">> {event}");
                writeln!(output, "{event}")?;
            }
            output.flush()?;
        }
        Ok(())
    }

    /// Execute one command and return the events it produces.
    pub fn execute(&mut self, command: Command) -> Vec<Event> {
        match command {
            Command::Move(mv) => match self.play(mv) {
                Ok(()) => Vec::new(),
                Err(message) => {
                    warn!("move {mv}: {message}");
                    vec![Event::Error(format!("illegal move {mv}: {message}"))]
                }
            },
            Command::Go => self.search(self.config.expansions),
            Command::Expand(n) => self.search(n),
            Command::New => {
                self.game = new_game(&self.config);
                self.tree = Tree::new();
                debug!("new game");
                Vec::new()
            }
            Command::Quit => Vec::new(),
        }
    }

    fn play(&mut self, mv: Move) -> Result<(), &'static str> {
        if self.game.winner().is_some() {
            return Err("game is over");
        }
        let board = self.game.board();
        let (x1, y1) = mv.first();
        let (x2, y2) = mv.second();
        if board.stone(x1, y1).is_some() || board.stone(x2, y2).is_some() {
            return Err("cell is occupied");
        }
        let expected = self.game.stones_this_turn().min(board.empty_count());
        let placed = if mv.is_single() { 1 } else { 2 };
        // A first stone that completes six ends the turn and the game.
        let wins_alone = mv.is_single() && board.is_winning(self.game.turn(), x1, y1);
        if placed != expected && !wins_alone {
            return Err(if expected == 1 {
                "expected a single stone"
            } else {
                "expected two stones"
            });
        }

        let mover = self.game.turn();
        if self.game.play_move(mv) {
            info!("{mover} wins with {mv}");
        }
        self.tree.commit_move(mv);
        Ok(())
    }

    /// Run up to `expansions` expansions (at least one on a fresh root) and
    /// report the best move.
    fn search(&mut self, expansions: usize) -> Vec<Event> {
        if self.game.winner().is_some() {
            return vec![Event::Error("game is over".to_string())];
        }

        let start = Instant::now();
        let budget = if self.tree.len() == 1 { expansions.max(1) } else { expansions };
        let mut done = 0;
        while done < budget && !self.tree.root_value().is_decided() {
            if done > 0 && self.config.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                debug!("time limit reached after {done} expansions");
                break;
            }
            self.tree.expand(&mut self.game);
            done += 1;
        }
        debug!(
            "searched {done} expansions in {:?}: {} nodes, root {}",
            start.elapsed(),
            self.tree.len(),
            self.tree.root_value()
        );

        let Some((mv, value)) = self.tree.best_move() else {
            return vec![Event::Error("no move available".to_string())];
        };
        let sims = self
            .tree
            .children()
            .find(|&(child, _, _)| child == mv)
            .map_or(1, |(_, _, sims)| sims);

        let info = Info::new()
            .with("expansions", done)
            .with("nodes", self.tree.len())
            .with("sims", self.tree.root_sims())
            .with("value", self.tree.root_value())
            .with("elapsed_ms", start.elapsed().as_millis());
        vec![Event::Info(info), Event::BestMove(self.best_move_event(mv, value, sims))]
    }

    /// Terminal flag and score for `mv`, found by playing it and taking it back.
    fn best_move_event(&mut self, mv: Move, value: Value, sims: u32) -> BestMove {
        let mover = self.game.turn();
        // On a dead board the draw move may not be playable.
        let (won, terminal) = if self.game.is_over() {
            (false, true)
        } else {
            let won = self.game.play_move(mv);
            let terminal = won || self.game.is_over();
            self.game.undo_move(mv);
            (won, terminal)
        };

        let score = if won {
            PROTOCOL_WIN_SCORE
        } else if terminal {
            0
        } else {
            match value {
                Value::Decided(Outcome::Win) => PROTOCOL_WIN_SCORE,
                Value::Decided(Outcome::Loss) => -PROTOCOL_WIN_SCORE,
                Value::Decided(Outcome::Draw) => 0,
                Value::Estimate(_) => {
                    let limit = f64::from(PROTOCOL_DECISIVE - 1);
                    (value.mean(sims) * limit).round().clamp(-limit, limit) as i32
                }
            }
        };

        BestMove {
            mv: Some(mv),
            terminal,
            score: if mover == Color::Black { score } else { -score },
        }
    }
}

fn new_game(config: &SearchConfig) -> Connect6 {
    let mut game = Connect6::new(config.seed);
    game.set_exp_factor(config.exp_factor);
    game
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn quick_engine() -> Engine {
        Engine::with_config(SearchConfig {
            expansions: 2,
            ..SearchConfig::default()
        })
    }

    fn run_script(engine: &mut Engine, script: &str) -> Vec<String> {
        let mut output = Vec::new();
        engine.run(Cursor::new(script), &mut output).unwrap();
        String::from_utf8(output).unwrap().lines().map(str::to_string).collect()
    }

    fn command(text: &str) -> Command {
        text.parse().unwrap()
    }

    /// Black has j10..n10 on rank 10 and is to move.
    const OPEN_FIVE: &str = "move j10\nmove a1-c1\nmove k10-l10\nmove e1-g1\nmove m10-n10\nmove a15-c15\n";

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.expansions, N_EXPANSIONS);
        assert_eq!(config.exp_factor, EXP_FACTOR);
        assert_eq!(config.time_limit, None);
    }

    #[test]
    fn test_move_produces_no_output() {
        let mut engine = quick_engine();
        assert!(engine.execute(command("move j10")).is_empty());
        assert_eq!(engine.game().turn(), Color::White);
        assert_eq!(engine.game().moves_played(), 1);
    }

    #[test]
    fn test_illegal_moves() {
        let mut engine = quick_engine();
        let events = engine.execute(command("move j10-k10"));
        assert!(matches!(&events[..], [Event::Error(_)]));

        engine.execute(command("move j10"));
        for bad in ["move j10-k11", "move k11"] {
            let events = engine.execute(command(bad));
            assert!(matches!(&events[..], [Event::Error(_)]), "{bad}");
        }
        assert_eq!(engine.game().moves_played(), 1);
    }

    #[test]
    fn test_go_reports_info_then_best_move() {
        let mut engine = quick_engine();
        let events = engine.execute(command("go"));
        assert_eq!(events.len(), 2);

        let Event::Info(info) = &events[0] else {
            panic!("expected info, got {}", events[0]);
        };
        assert_eq!(info.get("expansions"), Some("2"));

        let Event::BestMove(best) = &events[1] else {
            panic!("expected best-move, got {}", events[1]);
        };
        let mv = best.mv.unwrap();
        assert!(mv.is_single());
        assert!(!best.terminal);
        assert!(best.score.abs() < PROTOCOL_DECISIVE);
    }

    #[test]
    fn test_committed_move_keeps_search() {
        let mut engine = quick_engine();
        engine.execute(command("go"));
        let (mv, _) = engine.tree().best_move().unwrap();
        let (_, _, sims) = engine.tree().children().find(|c| c.0 == mv).unwrap();
        engine.execute(Command::Move(mv));
        assert_eq!(engine.tree().root_move(), mv);
        assert_eq!(engine.tree().root_sims(), sims);
    }

    #[test]
    fn test_winning_move_is_terminal() {
        let mut engine = quick_engine();
        let output = run_script(&mut engine, &format!("{OPEN_FIVE}go\n"));
        assert_eq!(output.len(), 2, "{output:?}");
        assert!(output[0].starts_with("info "));
        assert!(output[0].contains("sims=1;"), "{}", output[0]);
        assert_eq!(output[1], "best-move move=i10; terminal=true; score=1200");
    }

    #[test]
    fn test_single_stone_win_is_accepted_mid_game() {
        let mut engine = quick_engine();
        let output = run_script(&mut engine, &format!("{OPEN_FIVE}move i10
"));
        assert!(output.is_empty(), "{output:?}");
        assert_eq!(engine.game().winner(), Some(Color::Black));
        assert_eq!(engine.game().moves_played(), 7);
    }

    #[test]
    fn test_single_stone_without_win_is_rejected_mid_game() {
        let mut engine = quick_engine();
        let output = run_script(&mut engine, &format!("{OPEN_FIVE}move h10
"));
        assert_eq!(output.len(), 1);
        assert!(output[0].starts_with("error "), "{}", output[0]);
        assert_eq!(engine.game().winner(), None);
    }

    #[test]
    fn test_white_win_scores_negative() {
        let mut engine = quick_engine();
        // White holds j10..m10 and is to move; the single stone is rejected.
        let script = "move a1\nmove j10-k10\nmove a3-a5\nmove l10-m10\nmove a7-a9\nmove n10\ngo\n";
        let output = run_script(&mut engine, script);
        assert_eq!(output.len(), 3, "{output:?}");
        assert!(output[0].starts_with("error "));

        let best: Event = output[2].parse().unwrap();
        let Event::BestMove(best) = best else {
            panic!("expected best-move");
        };
        assert!(best.terminal);
        assert_eq!(best.score, -PROTOCOL_WIN_SCORE);
    }

    #[test]
    fn test_errors_do_not_stop_the_loop() {
        let mut engine = quick_engine();
        let output = run_script(&mut engine, "# comment\n\nfly away\nmove q99\nnew\nquit\ngo\n");
        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|line| line.starts_with("error ")));
    }

    #[test]
    fn test_new_resets_game_and_tree() {
        let mut engine = quick_engine();
        run_script(&mut engine, "move j10\nexpand 1\nnew\n");
        assert_eq!(engine.game().moves_played(), 0);
        assert_eq!(engine.tree().len(), 1);
    }

    #[test]
    fn test_moves_after_a_win_are_rejected() {
        let mut engine = quick_engine();
        run_script(&mut engine, OPEN_FIVE);
        assert!(engine.execute(command("move i10-o10")).is_empty());
        assert_eq!(engine.game().winner(), Some(Color::Black));
        assert!(matches!(&engine.execute(command("move a2-b2"))[..], [Event::Error(_)]));
        assert!(matches!(&engine.execute(Command::Go)[..], [Event::Error(_)]));
    }
}
