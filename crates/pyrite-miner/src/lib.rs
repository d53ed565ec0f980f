//! Multi-threaded proof-of-work nonce search.
//!
//! All workers observe one shared [`CommonState`]: a task word, the current
//! block template and target, and an atomic version counter. Re-tasking
//! bumps the version; workers poll it between hash batches, so cancellation
//! latency is bounded by the inner-loop check interval. The first worker to
//! find a satisfying nonce flips the task to `DropJob` under the lock and
//! invokes the handler exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use rand::Rng;
use tracing::{debug, info};

use pyrite_consensus::Complexity;
use pyrite_core::{ImmutableBlock, MutableBlock};

/// Nonces tried between two version polls.
const NONCE_CHECK_INTERVAL: u64 = 4096;

type MinedHandler = Box<dyn Fn(ImmutableBlock) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    None,
    DropJob,
    FindNonce,
    Exit,
}

#[derive(Clone)]
struct CommonData {
    task: Task,
    block: Option<MutableBlock>,
    complexity: Option<Complexity>,
}

struct CommonState {
    version: AtomicU64,
    data: Mutex<CommonData>,
    changed: Condvar,
    handler: MinedHandler,
}

impl CommonState {
    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn set_common_data(&self, data: CommonData) {
        let mut guard = self.data.lock().expect("miner state lock");
        self.version.fetch_add(1, Ordering::Release);
        *guard = data;
        self.changed.notify_all();
    }

    /// Block until the version moves past `last_seen`, then return the
    /// fresh data and the version it was read at.
    fn wait_and_read(&self, last_seen: &mut u64) -> CommonData {
        let mut guard = self.data.lock().expect("miner state lock");
        while self.version() == *last_seen {
            guard = self.changed.wait(guard).expect("miner state lock");
        }
        *last_seen = self.version();
        guard.clone()
    }

    /// Publish a mined block. Under the lock: bail unless a search is still
    /// active (so a racing second winner is dropped), flip to `DropJob` and
    /// bump the version so peers stop. The handler itself runs outside the
    /// lock; it is allowed to re-task the miner.
    fn call_handler_and_drop(&self, block: MutableBlock) {
        {
            let mut guard = self.data.lock().expect("miner state lock");
            if guard.task != Task::FindNonce {
                return;
            }
            self.version.fetch_add(1, Ordering::Release);
            guard.task = Task::DropJob;
            guard.block = None;
            guard.complexity = None;
            self.changed.notify_all();
        }
        (self.handler)(block.freeze());
    }
}

/// The mining coordinator. Owns the worker threads; dropping it stops them.
pub struct Miner {
    common: Arc<CommonState>,
    workers: Vec<JoinHandle<()>>,
}

impl Miner {
    /// Spawn `threads` workers (default: hardware concurrency) delivering
    /// mined blocks to `handler`.
    pub fn new(
        threads: Option<usize>,
        handler: impl Fn(ImmutableBlock) + Send + Sync + 'static,
    ) -> Self {
        let thread_count = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        let common = Arc::new(CommonState {
            version: AtomicU64::new(0),
            data: Mutex::new(CommonData {
                task: Task::None,
                block: None,
                complexity: None,
            }),
            changed: Condvar::new(),
            handler: Box::new(handler),
        });

        let workers = (0..thread_count)
            .map(|index| {
                let common = Arc::clone(&common);
                std::thread::Builder::new()
                    .name(format!("miner-{index}"))
                    .spawn(move || worker_loop(&common))
                    .expect("spawn miner worker")
            })
            .collect();

        info!(threads = thread_count, "miner running");
        Self { common, workers }
    }

    /// Start searching for a nonce that takes `block` under `complexity`.
    /// Replaces any job in flight.
    pub fn find_nonce(&self, block: MutableBlock, complexity: Complexity) {
        self.common.set_common_data(CommonData {
            task: Task::FindNonce,
            block: Some(block),
            complexity: Some(complexity),
        });
    }

    /// Cancel the job in flight, idling the workers.
    pub fn drop_job(&self) {
        self.common.set_common_data(CommonData {
            task: Task::None,
            block: None,
            complexity: None,
        });
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.common.set_common_data(CommonData {
            task: Task::Exit,
            block: None,
            complexity: None,
        });
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(common: &CommonState) {
    // Starting from zero lets a late-spawning worker pick up a job that was
    // published before its first wait.
    let mut last_seen = 0;
    loop {
        let data = common.wait_and_read(&mut last_seen);
        match data.task {
            Task::Exit => return,
            Task::None | Task::DropJob => continue,
            Task::FindNonce => {
                let mut block = data.block.expect("FIND_NONCE carries a template");
                let complexity = data.complexity.expect("FIND_NONCE carries a target");
                search(common, last_seen, &mut block, &complexity);
            }
        }
    }
}

/// Iterate nonces from a worker-unique random start, abandoning the search
/// as soon as the shared version moves.
fn search(common: &CommonState, job_version: u64, block: &mut MutableBlock, complexity: &Complexity) {
    let mut nonce: u64 = rand::thread_rng().gen();
    let mut since_poll = 0u64;
    loop {
        if since_poll >= NONCE_CHECK_INTERVAL {
            since_poll = 0;
            if common.version() != job_version {
                debug!("nonce search cancelled");
                return;
            }
        }
        since_poll += 1;

        block.set_nonce(nonce);
        if complexity.accepts(&block.hash()) {
            debug!(nonce, "nonce found");
            common.call_handler_and_drop(block.clone());
            return;
        }
        nonce = nonce.wrapping_add(1);
    }
}
