// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — State Arena
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-call ownership pool for intermediate track states.
//!
//! States are addressed by `StateId`. A slot is emptied exactly once,
//! either by `take` (ownership leaves the arena) or by `sweep`.

use trackx_types::parameters::TrackParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(usize);

#[derive(Debug, Default)]
pub struct StateArena {
    slots: Vec<Option<TrackParameters>>,
    released: usize,
    taken: usize,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parameters: TrackParameters) -> StateId {
        self.slots.push(Some(parameters));
        StateId(self.slots.len() - 1)
    }

    pub fn get(&self, id: StateId) -> Option<&TrackParameters> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Move a state out of the arena, e.g. to return it to the caller.
    pub fn take(&mut self, id: StateId) -> Option<TrackParameters> {
        let out = self.slots.get_mut(id.0).and_then(Option::take);
        if out.is_some() {
            self.taken += 1;
        }
        out
    }

    /// Free every live state except `protected`. Returns how many were freed.
    pub fn sweep(&mut self, protected: &[StateId]) -> usize {
        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !protected.contains(&StateId(i)) {
                *slot = None;
                freed += 1;
            }
        }
        self.released += freed;
        freed
    }

    /// States ever inserted.
    pub fn created(&self) -> usize {
        self.slots.len()
    }

    pub fn released(&self) -> usize {
        self.released
    }

    /// States moved out with `take`.
    pub fn taken(&self) -> usize {
        self.taken
    }
}
