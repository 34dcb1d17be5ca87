//! Generic (previous tag, current tag) transition table
//!
//! Used for every tag that has no dedicated handler in the state machine.
//! Pairs missing from the table resolve to Transit at 0.5.

use crate::types::{ActivityState, TagCode};
use std::collections::HashMap;

/// Fallback when a pair is not in the table
pub const DEFAULT_TRANSITION: Transition = Transition {
    state: ActivityState::Transit,
    probability: 0.5,
};

/// Outcome of a table lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: ActivityState,
    pub probability: f64,
}

/// Read-only transition table, built once per state machine
#[derive(Debug, Clone)]
pub struct TransitionTable {
    transitions: HashMap<(TagCode, TagCode), Transition>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionTable {
    pub fn new() -> Self {
        use ActivityState::*;
        use TagCode::*;

        let entries: [(TagCode, TagCode, ActivityState, f64); 24] = [
            // equipment usage
            (O, O, Work, 0.98),
            (G1, O, Work, 0.98),
            (O, G1, Work, 0.95),
            (O, T1, Transit, 0.90),
            (O, M1, Meal, 1.00),
            (O, T2, Exit, 0.90),
            // meals
            (T1, M1, Meal, 1.00),
            (M1, T1, Transit, 1.00),
            (T1, M2, Transit, 1.00),
            (M2, N2, Rest, 0.90),
            // work areas
            (G1, G1, Work, 0.85),
            (G2, G1, Work, 0.90),
            (G1, G3, Meeting, 0.95),
            (G1, G4, Education, 0.95),
            (T2, G2, Preparation, 0.95),
            // gates
            (T2, T1, Entry, 0.95),
            (T1, T2, Exit, 0.90),
            (T3, T1, Entry, 0.95),
            (T1, T3, Exit, 0.90),
            // rest
            (G1, N1, Rest, 0.90),
            (N1, G1, Work, 0.85),
            (N1, N1, Rest, 0.95),
            (N2, N2, Rest, 0.95),
            (T1, N1, Rest, 0.85),
        ];

        let transitions = entries
            .into_iter()
            .map(|(from, to, state, probability)| ((from, to), Transition { state, probability }))
            .collect();

        Self { transitions }
    }

    /// Look up a transition; `None` when the pair is unknown
    pub fn get(&self, from: TagCode, to: TagCode) -> Option<Transition> {
        self.transitions.get(&(from, to)).copied()
    }

    /// Look up with the documented fallback applied
    pub fn resolve(&self, from: Option<TagCode>, to: TagCode) -> Transition {
        from.and_then(|prev| self.get(prev, to))
            .unwrap_or(DEFAULT_TRANSITION)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
