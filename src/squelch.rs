//! The triggered/quiet decision for each classified block.
//!
//! Output depends on both the current state and the incoming block: a signal
//! block arriving while quiet opens an event and may pull the retained block
//! in front of it, and the first quiet block after an event may be kept as a
//! trailing pad.

use crate::{
    classify::{block_threshold, Classification},
    noise::NoiseEstimator,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EventState {
    Idle,
    Active,
}

/// An event boundary crossed by the latest block
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Edge {
    Start,
    End,
}

/// What to do with the blocks around the one just classified
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Decision {
    /// Emit the retained block that preceded this one
    pub emit_previous: bool,
    /// Emit this block
    pub emit_current: bool,
    pub edge: Option<Edge>,
}

#[derive(Debug)]
pub struct EventStateMachine {
    state: EventState,
    threshold_percent: u8,
    padding: bool,
    auto: bool,
    noise: NoiseEstimator,
    events: u64,
}

impl EventStateMachine {
    pub fn new(threshold_percent: u8, padding: bool, auto: bool) -> Self {
        Self {
            state: EventState::Idle,
            threshold_percent,
            padding,
            auto,
            noise: NoiseEstimator::new(),
            events: 0,
        }
    }

    /// A block is signal when strictly more samples than the block threshold are over
    pub fn is_signal(&self, class: &Classification) -> bool {
        class.over_threshold as u64 > block_threshold(class.samples as usize, self.threshold_percent)
    }

    pub fn step(&mut self, class: &Classification) -> Decision {
        let signal = self.is_signal(class);
        let (next, decision) = match (self.state, signal) {
            (EventState::Idle, true) => {
                self.events += 1;
                (
                    EventState::Active,
                    Decision {
                        emit_previous: self.padding,
                        emit_current: true,
                        edge: Some(Edge::Start),
                    },
                )
            }
            (EventState::Active, true) => (
                EventState::Active,
                Decision {
                    emit_current: true,
                    ..Decision::default()
                },
            ),
            (EventState::Active, false) => (
                EventState::Idle,
                Decision {
                    emit_current: self.padding,
                    edge: Some(Edge::End),
                    ..Decision::default()
                },
            ),
            (EventState::Idle, false) => {
                if self.auto {
                    self.noise.update(class.mean_magnitude());
                }
                (EventState::Idle, Decision::default())
            }
        };
        self.state = next;
        decision
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    /// Number of quiet-to-triggered transitions seen so far
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn noise(&self) -> &NoiseEstimator {
        &self.noise
    }
}
