//! # Parallel Rollout Pool
//!
//! Evaluates candidate moves of a tile game by running randomized rollouts of
//! every candidate on all available cores and merging the per-thread results
//! into one ranked list.
//!
//! ```rust,ignore
//! let mut pool = WorkerPool::new(PoolConfig::from_env(), |i| TilePlayoutEngine::seeded(i as u64))?;
//! pool.configure(&SimSetup::new(position))?;
//! pool.start(2)?;
//! std::thread::sleep(Duration::from_secs(5));
//! pool.stop()?;
//! let ranked = pool.combined_moves(true, RankBy::Win);
//! ```

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod pool;
pub mod progress;
pub mod report;
pub mod types;
pub mod worker;

pub use config::PoolConfig;
pub use engine::{RolloutError, RolloutSample, SimulationEngine};
pub use error::SimError;
pub use pool::{PoolState, WorkerPool};
pub use progress::ProgressEvent;
pub use sim_stats::{CandidateStatistics, RunningStat};
pub use types::{
    Bag, Board, CandidateMove, CombinedMove, OpponentConstraints, Position, Rack, RankBy, SimSetup,
};
