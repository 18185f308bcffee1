use super::state::ObjectState;

/// Tick-indexed ring of committed object states, keyed by the timestamp of
/// the tick the state was captured at (before that tick ran).
#[derive(Debug, Clone)]
pub struct StateHistory {
    states: Vec<Option<ObjectState>>,
    ticks: Vec<u32>,
    capacity: usize,
    tick_ms: u32,
}

impl StateHistory {
    pub fn new(capacity: usize, tick_ms: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            states: vec![None; capacity],
            ticks: vec![u32::MAX; capacity],
            capacity,
            tick_ms: tick_ms.max(1),
        }
    }

    fn index(&self, tick: u32) -> usize {
        ((tick / self.tick_ms) as usize) % self.capacity
    }

    pub fn push(&mut self, tick: u32, state: ObjectState) {
        let index = self.index(tick);
        self.states[index] = Some(state);
        self.ticks[index] = tick;
    }

    pub fn get(&self, tick: u32) -> Option<&ObjectState> {
        let index = self.index(tick);
        if self.ticks[index] == tick {
            self.states[index].as_ref()
        } else {
            None
        }
    }

    pub fn earliest(&self) -> Option<(u32, &ObjectState)> {
        self.ticks
            .iter()
            .zip(&self.states)
            .filter_map(|(&tick, state)| state.as_ref().map(|s| (tick, s)))
            .min_by_key(|(tick, _)| *tick)
    }

    /// State to resume from when rewinding to `tick`: the exact entry, or the
    /// earliest retained one when `tick` predates the ring.
    pub fn restore_point(&self, tick: u32) -> Option<(u32, &ObjectState)> {
        if let Some(state) = self.get(tick) {
            return Some((tick, state));
        }
        self.earliest().filter(|(earliest, _)| *earliest > tick)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.states {
            *slot = None;
        }
        for tick in &mut self.ticks {
            *tick = u32::MAX;
        }
    }
}
