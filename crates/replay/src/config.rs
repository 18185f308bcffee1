use glide::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
    pub loss_percent: f32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 30,
            max_latency_ms: 120,
            jitter_ms: 40,
            loss_percent: 0.0,
        }
    }
}

impl LinkConfig {
    pub fn worst_delay_ms(&self) -> u32 {
        self.max_latency_ms.max(self.min_latency_ms) + self.jitter_ms
    }

    pub fn is_lossy(&self) -> bool {
        self.loss_percent > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub sim: SimConfig,
    pub link: LinkConfig,
    pub objects: usize,
    pub duration_ms: u32,
    /// How often every object changes its input.
    pub input_interval_ms: u32,
    /// How often queued input is packed into a batch and sent.
    pub send_interval_ms: u32,
    pub seed: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            link: LinkConfig::default(),
            objects: 8,
            duration_ms: 5_000,
            input_interval_ms: 100,
            send_interval_ms: 60,
            seed: 1,
        }
    }
}
