//! # Simulate - Rank Candidate Moves by Rollout
//!
//! Builds a position from the command line, runs the rollout pool on every
//! core for a wall-clock budget (or a fixed number of batches per worker) and
//! prints the combined ranking.
//!
//! ## Usage
//! ```text
//! simulate --rack QUACKLE --move "8D QUACKLE/QUACKLE/110" --move "8H QUA/QUA/24" --seconds 10
//! ```
//! Run with `cargo run --release` for meaningful rollout counts.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::info;
use simpool::engines::TilePlayoutEngine;
use simpool::report::statistic_table;
use simpool::{CandidateMove, PoolConfig, Position, Rack, RankBy, SimSetup, WorkerPool};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rack of the player on turn, e.g. QUACKLE (use ? for a blank)
    #[arg(long)]
    rack: String,

    /// Candidate move as DESCRIPTION/TILES/SCORE[/EQUITY]; repeat for each move
    #[arg(long = "move", required = true)]
    moves: Vec<String>,

    /// Simulate only the moves with these descriptions (others are listed but not rolled out)
    #[arg(long)]
    only: Vec<String>,

    /// Tiles known to be on the opponent's rack
    #[arg(long)]
    opponent_rack: Option<String>,

    /// Current score difference from the point of view of the player on turn
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    spread: i32,

    /// Let opponents pass every turn during rollouts
    #[arg(long, default_value_t = false)]
    ignore_opponents: bool,

    /// Wall-clock budget in seconds (ignored with --batches)
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Run exactly this many batches per worker instead of a time budget
    #[arg(long)]
    batches: Option<u64>,

    /// Turns to look ahead after each candidate (default: SIMPOOL_PLIES or 2)
    #[arg(long)]
    plies: Option<u32>,

    /// Worker threads (default: SIMPOOL_THREADS or all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Rollouts per batch (default: SIMPOOL_BATCH_SIZE or 10)
    #[arg(long)]
    batch_size: Option<u32>,

    /// Rank by "equity" or "win"
    #[arg(long, default_value = "equity")]
    rank: RankBy,

    /// Leave excluded moves out of the result
    #[arg(long, default_value_t = false)]
    prune: bool,

    /// Base RNG seed; worker i uses seed + i
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn pool_config(&self) -> PoolConfig {
        let mut config = PoolConfig::from_env();
        if let Some(threads) = self.threads {
            config = config.with_workers(threads);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(plies) = self.plies {
            config = config.with_plies(plies);
        }
        config
    }

    fn setup(&self) -> Result<SimSetup> {
        let rack: Rack = self.rack.parse().context("parsing --rack")?;
        let moves = self
            .moves
            .iter()
            .map(|m| m.parse::<CandidateMove>().with_context(|| format!("parsing --move {}", m)))
            .collect::<Result<Vec<_>>>()?;
        let included: Vec<CandidateMove> = moves
            .iter()
            .filter(|m| self.only.iter().any(|d| d == &m.description))
            .cloned()
            .collect();
        if included.len() != self.only.len() {
            anyhow::bail!("every --only description must match a --move");
        }

        let mut position = Position::two_player(rack, Rack::default(), moves);
        position.scores = vec![self.spread.max(0), (-self.spread).max(0)];

        let mut setup = SimSetup::new(position)
            .with_included_moves(included)
            .ignoring_opponents(self.ignore_opponents);
        if let Some(tiles) = &self.opponent_rack {
            setup = setup.with_partial_opponent_rack(tiles.parse().context("parsing --opponent-rack")?);
        }
        Ok(setup)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let setup = args.setup()?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut pool = WorkerPool::new(args.pool_config(), |i| {
        TilePlayoutEngine::seeded(seed.wrapping_add(i as u64))
    })?;
    pool.configure(&setup)?;
    let plies = pool.config().plies;

    println!("{}", "Rollout Simulation".bold());
    println!("==================");
    println!("Rack: {}", setup.position.current_rack());
    println!("Candidates: {}", pool.candidates().len());
    println!("Workers: {}", pool.worker_count());
    println!("Plies: {}", plies);
    println!("Seed: {}", seed);
    println!("------------------");

    #[cfg(debug_assertions)]
    println!("WARNING: Running in debug mode. Rollout counts will be significantly lower.\nUse --release for real analysis.\n");

    let events = pool.subscribe();
    match args.batches {
        Some(batches) => pool.start_bounded(plies, batches)?,
        None => pool.start(plies)?,
    }

    let started = Instant::now();
    let budget = Duration::from_secs(args.seconds);
    let mut last_report = Instant::now();
    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        let latest = events.try_iter().last().map(|e| e.total);
        if last_report.elapsed() >= Duration::from_secs(1) {
            println!("{} rollouts", latest.unwrap_or_else(|| pool.progress()));
            last_report = Instant::now();
        }
        let finished = match args.batches {
            Some(_) => !pool.is_running(),
            None => started.elapsed() >= budget,
        };
        if finished {
            break;
        }
    }

    match args.batches {
        Some(_) => pool.wait()?,
        None => pool.stop()?,
    }
    let elapsed = started.elapsed();
    info!(
        "{} rollouts in {:.2}s ({} failed batches)",
        pool.progress(),
        elapsed.as_secs_f64(),
        pool.failed_batches()
    );

    let ranked = pool.combined_moves(args.prune, args.rank);
    println!();
    for (i, line) in statistic_table(&ranked, pool.progress()).lines().enumerate() {
        match i {
            0 => println!("{}", line.bold()),
            1 => println!("{}", line.green().bold()),
            _ => println!("{}", line),
        }
    }
    Ok(())
}
