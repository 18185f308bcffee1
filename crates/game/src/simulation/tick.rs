/// Maps wall-clock milliseconds onto the fixed tick grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    tick_ms: u32,
}

impl TickClock {
    pub fn new(tick_ms: u32) -> Self {
        Self {
            tick_ms: tick_ms.max(1),
        }
    }

    pub fn tick_ms(&self) -> u32 {
        self.tick_ms
    }

    pub fn dt(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }

    /// Start of the tick containing `timestamp`.
    pub fn align(&self, timestamp: u32) -> u32 {
        timestamp - timestamp % self.tick_ms
    }

    pub fn next(&self, tick: u32) -> u32 {
        tick.saturating_add(self.tick_ms)
    }

    pub fn ticks_between(&self, from: u32, to: u32) -> u32 {
        to.saturating_sub(from) / self.tick_ms
    }

    /// Fraction of the tick following `committed` that has elapsed at `now`.
    pub fn alpha(&self, now: u32, committed: u32) -> f32 {
        let elapsed = now.saturating_sub(committed) as f32;
        (elapsed / self.tick_ms as f32).clamp(0.0, 1.0)
    }
}
