//! Key-space search: plugboard refinement workers, their batch-synchronous
//! orchestrators, and the exhaustive sweep attacks.

pub mod gillogly;
pub mod hillclimb;
pub mod sweep;
pub mod worker;

pub use gillogly::GilloglyAttack;
pub use hillclimb::HillClimb;
pub use sweep::TrigramIcSearch;
pub use worker::{HcSaWorker, OptimizerMode};

use crate::report::ResultReporter;
use crate::stats::EnigmaStats;
use rayon::prelude::*;

/// Builds the bounded pool for one search invocation. Batches never use
/// more threads than they have workers.
pub(crate) fn build_pool(threads: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .expect("worker pool construction")
}

/// Runs one batch to completion (full barrier). Each worker owns its key,
/// ciphertext copy, and RNG; the only shared state is read-only.
pub(crate) fn run_batch(
    pool: &rayon::ThreadPool,
    workers: &mut [HcSaWorker],
    stats: &EnigmaStats,
    reporter: &dyn ResultReporter,
) {
    pool.install(|| {
        workers
            .par_iter_mut()
            .for_each(|w| w.run(stats, reporter));
    });
}
