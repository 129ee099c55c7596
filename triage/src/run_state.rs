//! Run State — budget and dedup set for a single run
//!
//! Owned by the orchestrator for the lifetime of one run and dropped
//! afterwards. The dispatcher only touches the budget; the orchestrator
//! only touches the dedup set.

use std::collections::HashSet;

use crate::model::PrRef;

#[derive(Debug, Clone)]
pub struct RunState {
    cap: u32,
    remaining_budget: u32,
    dispatched: u32,
    dedup: HashSet<PrRef>,
}

impl RunState {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            remaining_budget: cap,
            dispatched: 0,
            dedup: HashSet::new(),
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn remaining_budget(&self) -> u32 {
        self.remaining_budget
    }

    pub fn budget_exhausted(&self) -> bool {
        self.remaining_budget == 0
    }

    /// Actions counted against the budget so far (dry-run included).
    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    /// Take one unit of budget. Returns false, with no change, when empty.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining_budget == 0 {
            return false;
        }
        self.remaining_budget -= 1;
        self.dispatched += 1;
        true
    }

    /// Record a terminal verdict. Returns false if the PR was already terminal.
    pub fn mark_terminal(&mut self, pr: &PrRef) -> bool {
        self.dedup.insert(pr.clone())
    }

    pub fn is_terminal(&self, pr: &PrRef) -> bool {
        self.dedup.contains(pr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_never_goes_below_zero() {
        let mut state = RunState::new(2);
        assert!(state.try_consume());
        assert!(state.try_consume());
        assert!(!state.try_consume());
        assert_eq!(state.remaining_budget(), 0);
        assert_eq!(state.dispatched(), 2);
        assert!(state.budget_exhausted());
    }

    #[test]
    fn test_budget_is_monotonic_and_capped() {
        let mut state = RunState::new(3);
        let mut last = state.remaining_budget();
        assert_eq!(last, state.cap());
        for _ in 0..5 {
            state.try_consume();
            assert!(state.remaining_budget() <= last);
            assert!(state.remaining_budget() <= state.cap());
            last = state.remaining_budget();
        }
    }

    #[test]
    fn test_zero_cap_is_immediately_exhausted() {
        let mut state = RunState::new(0);
        assert!(state.budget_exhausted());
        assert!(!state.try_consume());
        assert_eq!(state.dispatched(), 0);
    }

    #[test]
    fn test_mark_terminal_once() {
        let mut state = RunState::new(1);
        let pr = PrRef::new("octo", "widgets", 9);
        assert!(!state.is_terminal(&pr));
        assert!(state.mark_terminal(&pr));
        assert!(!state.mark_terminal(&pr));
        assert!(state.is_terminal(&pr));
        assert!(!state.is_terminal(&PrRef::new("octo", "widgets", 10)));
    }
}
