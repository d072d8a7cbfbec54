//! Hot-reload state machine.
//!
//! `Stable → Compiling → Swapping → Stable`. A failed compile aborts back to
//! `Stable` with the previous program still deployed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadState {
    #[default]
    Stable,
    Compiling,
    Swapping,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadState::Stable => "stable",
            ReloadState::Compiling => "compiling",
            ReloadState::Swapping => "swapping",
        };
        f.write_str(name)
    }
}

/// What happened to live state on the last swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carryover {
    /// Same layout: every slot kept its value.
    Restored,
    /// Layout changed: built-in state starts fresh.
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct HotReload {
    state: ReloadState,
    /// Successful swaps so far.
    generation: u64,
    last: Option<Carryover>,
}

impl HotReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_carryover(&self) -> Option<Carryover> {
        self.last
    }

    /// Enter `Compiling`. Returns false if a reload is already running.
    pub fn begin(&mut self) -> bool {
        if self.state != ReloadState::Stable {
            return false;
        }
        self.state = ReloadState::Compiling;
        true
    }

    pub fn swapping(&mut self) {
        debug_assert_eq!(self.state, ReloadState::Compiling);
        self.state = ReloadState::Swapping;
    }

    pub fn finish(&mut self, carryover: Carryover) {
        debug_assert_eq!(self.state, ReloadState::Swapping);
        self.state = ReloadState::Stable;
        self.generation += 1;
        self.last = Some(carryover);
    }

    pub fn abort(&mut self) {
        self.state = ReloadState::Stable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut reload = HotReload::new();
        assert!(reload.begin());
        assert_eq!(reload.state(), ReloadState::Compiling);
        assert!(!reload.begin());
        reload.swapping();
        reload.finish(Carryover::Restored);
        assert_eq!(reload.state(), ReloadState::Stable);
        assert_eq!(reload.generation(), 1);
        assert_eq!(reload.last_carryover(), Some(Carryover::Restored));
    }

    #[test]
    fn abort_returns_to_stable() {
        let mut reload = HotReload::new();
        assert!(reload.begin());
        reload.abort();
        assert_eq!(reload.state(), ReloadState::Stable);
        assert_eq!(reload.generation(), 0);
    }
}
