use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::LinkConfig;

/// Deterministic noise: hashes the seed with a running counter.
#[derive(Debug, Clone)]
pub struct SeededNoise {
    seed: u64,
    counter: u64,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut hasher = DefaultHasher::new();
        (self.seed, self.counter).hash(&mut hasher);
        self.counter += 1;
        hasher.finish()
    }

    /// Uniform in `[0, 1]`.
    pub fn unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn percent(&mut self) -> f32 {
        self.unit() * 100.0
    }
}

#[derive(Debug)]
struct DelayedBatch {
    release_ms: u32,
    sequence: u64,
    bytes: Vec<u8>,
}

impl PartialEq for DelayedBatch {
    fn eq(&self, other: &Self) -> bool {
        self.release_ms == other.release_ms && self.sequence == other.sequence
    }
}

impl Eq for DelayedBatch {}

impl PartialOrd for DelayedBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap pops the earliest release first.
        other
            .release_ms
            .cmp(&self.release_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub reordered: u64,
}

/// One-way link that delays, reorders and optionally drops batches.
#[derive(Debug)]
pub struct Link {
    config: LinkConfig,
    noise: SeededNoise,
    queue: BinaryHeap<DelayedBatch>,
    sequence: u64,
    last_delivered: Option<u64>,
    stats: LinkStats,
}

impl Link {
    pub fn new(config: LinkConfig, seed: u64) -> Self {
        Self {
            config,
            noise: SeededNoise::new(seed),
            queue: BinaryHeap::new(),
            sequence: 0,
            last_delivered: None,
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    fn delay_ms(&mut self) -> u32 {
        let base = self.config.min_latency_ms;
        let range = self.config.max_latency_ms.saturating_sub(base);
        let spread = (self.noise.unit() * range as f32) as u32;
        let jitter = (self.noise.unit() * self.config.jitter_ms as f32) as u32;
        base + spread + jitter
    }

    pub fn send(&mut self, now_ms: u32, bytes: Vec<u8>) {
        self.stats.sent += 1;
        if self.config.is_lossy() && self.noise.percent() < self.config.loss_percent {
            self.stats.dropped += 1;
            log::debug!("link dropped batch sent at {now_ms}");
            return;
        }

        let release_ms = now_ms.saturating_add(self.delay_ms());
        self.queue.push(DelayedBatch {
            release_ms,
            sequence: self.sequence,
            bytes,
        });
        self.sequence += 1;
    }

    /// Everything whose release time has passed, in arrival order.
    pub fn deliver(&mut self, now_ms: u32) -> Vec<Vec<u8>> {
        let mut ready = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|batch| batch.release_ms <= now_ms)
        {
            let Some(batch) = self.queue.pop() else {
                break;
            };
            if self.last_delivered.is_some_and(|last| batch.sequence < last) {
                self.stats.reordered += 1;
            }
            let newest = self
                .last_delivered
                .map_or(batch.sequence, |last| last.max(batch.sequence));
            self.last_delivered = Some(newest);
            self.stats.delivered += 1;
            ready.push(batch.bytes);
        }
        ready
    }
}
