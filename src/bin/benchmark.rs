use anyhow::Result;
use clap::Parser;
use simpool::engines::TilePlayoutEngine;
use simpool::{CandidateMove, PoolConfig, Position, SimSetup, WorkerPool};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run duration per thread count in seconds (default: 5)
    #[arg(long, default_value_t = 5)]
    duration: u64,

    /// Comma-separated thread counts to measure (default: 1 and all cores)
    #[arg(long, value_delimiter = ',')]
    threads: Vec<usize>,

    /// Rollouts per batch (default: 10)
    #[arg(long, default_value_t = 10)]
    batch_size: u32,

    /// Plies per rollout (default: 2)
    #[arg(long, default_value_t = 2)]
    plies: u32,
}

fn bench_position() -> Position {
    let moves = vec![
        CandidateMove::new("8D RETAINS", "RETAINS", 72),
        CandidateMove::new("8G STAIR", "STAIR", 12),
        CandidateMove::new("8H TEN", "TEN", 6),
        CandidateMove::new("-AEINR", "", 0),
    ];
    Position::two_player("AEINRST".parse().unwrap_or_default(), Default::default(), moves)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut thread_counts = args.threads.clone();
    if thread_counts.is_empty() {
        thread_counts = vec![1, num_cpus::get().max(1)];
    }

    println!("Parallel Rollout Pool - Benchmark Tool");
    println!("======================================");
    println!("Duration: {} seconds per run", args.duration);
    println!("Thread counts: {:?}", thread_counts);
    println!("Batch Size: {}", args.batch_size);
    println!("Plies: {}", args.plies);
    println!("--------------------------------------");

    #[cfg(debug_assertions)]
    println!("WARNING: Running in debug mode. Performance will be significantly lower.\nUse --release for accurate benchmarks.\n");

    let setup = SimSetup::new(bench_position());
    for threads in thread_counts {
        let config = PoolConfig::default()
            .with_workers(threads)
            .with_batch_size(args.batch_size)
            .with_plies(args.plies);
        let mut pool = WorkerPool::new(config, |i| TilePlayoutEngine::seeded(0x5eed + i as u64))?;
        pool.configure(&setup)?;

        let start = Instant::now();
        pool.start(args.plies)?;
        std::thread::sleep(Duration::from_secs(args.duration));
        pool.stop()?;
        let duration = start.elapsed();

        print_stats(threads, &pool, duration);
    }
    Ok(())
}

fn print_stats(threads: usize, pool: &WorkerPool<TilePlayoutEngine>, duration: Duration) {
    let secs = duration.as_secs_f64();
    let rollouts = pool.progress();
    let simulated = pool.candidates().iter().filter(|c| !c.excluded).count().max(1);

    println!("{} thread(s):", threads);
    println!("  Batches x Batch Size: {}", rollouts);
    println!("  Time: {:.3}s", secs);
    println!("  Rollouts: {:.0} /sec", rollouts as f64 * simulated as f64 / secs);
    println!("  Failed Batches: {}", pool.failed_batches());
}
