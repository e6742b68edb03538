//! Concurrent counter stress for the atomic primitives.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use opguard_core::AtomicCounter;

/// Per-worker preallocation cap for recorded values
const PREALLOC_MAX: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterReport {
    pub threads: u64,
    pub iters: u64,
    pub expected: u64,
    pub final_value: u64,
    /// Distinct post-increment values handed out across all threads
    pub distinct: usize,
    pub max_seen: u64,
}

impl CounterReport {
    pub fn is_consistent(&self) -> bool {
        self.final_value == self.expected
            && self.distinct as u64 == self.expected
            && self.max_seen == self.expected
    }
}

/// `threads` workers each do `iters` increments of one shared counter.
pub fn run(threads: u64, iters: u64) -> Result<CounterReport> {
    let Some(expected) = threads.checked_mul(iters) else {
        bail!("threads * iters overflows u64 ({} * {})", threads, iters);
    };

    let counter = Arc::new(AtomicU64::new(0));
    let max_seen = Arc::new(AtomicU64::new(0));

    let handles = (0..threads)
        .map(|id| {
            let counter = Arc::clone(&counter);
            let max_seen = Arc::clone(&max_seen);
            std::thread::Builder::new()
                .name(format!("counter-{}", id))
                .spawn(move || {
                    let mut values = Vec::with_capacity(iters.min(PREALLOC_MAX) as usize);
                    for _ in 0..iters {
                        let new = counter.add_fetch_new(1);
                        let mut cur = max_seen.load(Ordering::SeqCst);
                        while cur < new {
                            let seen = max_seen.cas_value(cur, new);
                            if seen == cur {
                                break;
                            }
                            cur = seen;
                        }
                        values.push(new);
                    }
                    values
                })
                .with_context(|| format!("failed to spawn counter worker {}", id))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut distinct = HashSet::new();
    for handle in handles {
        let values = handle
            .join()
            .map_err(|_| anyhow!("counter worker panicked"))?;
        distinct.extend(values);
    }

    Ok(CounterReport {
        threads,
        iters,
        expected,
        final_value: counter.load(Ordering::SeqCst),
        distinct: distinct.len(),
        max_seen: max_seen.load(Ordering::SeqCst),
    })
}
