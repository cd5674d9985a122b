// Sequencer Module - The shared animation state machine
//
// Every mode runs the same timing skeleton: fade out, fade in over a reset
// baseline, reveal with the progress indicator, randomized working state,
// final terminal state, settle. The offsets live in one table here instead
// of being re-derived at each call site, and the machine is polled with a
// caller-supplied clock, so the whole sequence is testable without timers.

use crate::types::LatticeMode;
use serde::{Deserialize, Serialize};

/// The animation phase the surface is currently rendering. Exactly one is
/// active at a time; only the sequencer-driven engine transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Initial,
    FadeOut,
    FadeIn,
    /// Filtering: center hexagon highlighted (also the resting thumbnail).
    Selected,
    /// Filtering: non-selected dots faded away.
    Filtered,
    /// Ordering/clustering: randomized working state.
    Random,
    /// Ordering/clustering: sorted/target-mapped terminal state.
    Arranged,
    /// Enriching: coarse working state.
    Coarse,
    /// Enriching: dense terminal state.
    Fine,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::FadeOut => "fadeOut",
            Phase::FadeIn => "fadeIn",
            Phase::Selected => "selected",
            Phase::Filtered => "filtered",
            Phase::Random => "random",
            Phase::Arranged => "arranged",
            Phase::Coarse => "coarse",
            Phase::Fine => "fine",
        }
    }
}

/// What the engine has to do when a step comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// t=0: hide everything.
    FadeOut,
    /// t=300: fade back in over a reset pre-working baseline.
    Baseline,
    /// t=600: back to the initial phase, progress indicator on.
    Reveal,
    /// t=1500: assign the randomized working state.
    Working,
    /// t=3000 (3500 for filtering): assign the final state.
    Terminal,
    /// t=4500 (4700 for filtering): progress off, run over.
    Settle,
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub at_ms: u64,
    pub action: StepAction,
}

/// A step that has come due. `at_ms` is the absolute scheduled time (run
/// start + offset), not the poll time, so downstream timing stays exact
/// under frame jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredStep {
    pub at_ms: u64,
    pub action: StepAction,
}

/// The fixed transition table for one mode. All modes share the first four
/// offsets; filtering holds its terminal state longer.
pub fn schedule(mode: LatticeMode) -> Vec<Step> {
    let (terminal_ms, settle_ms) = match mode {
        LatticeMode::Filter => (3500, 4700),
        _ => (3000, 4500),
    };
    vec![
        Step { at_ms: 0, action: StepAction::FadeOut },
        Step { at_ms: 300, action: StepAction::Baseline },
        Step { at_ms: 600, action: StepAction::Reveal },
        Step { at_ms: 1500, action: StepAction::Working },
        Step { at_ms: terminal_ms, action: StepAction::Terminal },
        Step { at_ms: settle_ms, action: StepAction::Settle },
    ]
}

/// How long the progress indicator sweeps once shown (it appears at the
/// reveal step and drains until settle).
pub const PROGRESS_SWEEP_MS: u64 = 4100;

/// Single-flight timed step runner. `activate` arms the table; `poll`
/// returns the steps that have come due, in order, each exactly once, and
/// disarms itself after the last one. State is only ever mutated by the
/// owner calling in - there are no callbacks to outlive anything.
pub struct Sequencer {
    steps: Vec<Step>,
    started_at: Option<u64>,
    next_step: usize,
}

impl Sequencer {
    pub fn new(mode: LatticeMode) -> Self {
        Sequencer {
            steps: schedule(mode),
            started_at: None,
            next_step: 0,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.started_at.is_some()
    }

    /// Arm the run. Returns false (and does nothing) while a run is already
    /// in flight.
    pub fn activate(&mut self, now_ms: u64) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now_ms);
        self.next_step = 0;
        true
    }

    /// All steps due at or before `now_ms`, oldest first. A run that has
    /// fired its last step is over: `is_animating` is false from the settle
    /// timestamp onward.
    pub fn poll(&mut self, now_ms: u64) -> Vec<FiredStep> {
        let Some(start) = self.started_at else {
            return Vec::new();
        };

        let mut due = Vec::new();
        while self.next_step < self.steps.len() {
            let step = self.steps[self.next_step];
            let fire_at = start + step.at_ms;
            if fire_at > now_ms {
                break;
            }
            due.push(FiredStep {
                at_ms: fire_at,
                action: step.action,
            });
            self.next_step += 1;
        }

        if self.next_step == self.steps.len() {
            self.started_at = None;
            self.next_step = 0;
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(fired: &[FiredStep]) -> Vec<StepAction> {
        fired.iter().map(|f| f.action).collect()
    }

    #[test]
    fn test_filtering_schedule_offsets() {
        let steps = schedule(LatticeMode::Filter);
        let offsets: Vec<u64> = steps.iter().map(|s| s.at_ms).collect();
        assert_eq!(offsets, vec![0, 300, 600, 1500, 3500, 4700]);
    }

    #[test]
    fn test_shared_schedule_offsets() {
        for mode in [LatticeMode::Order, LatticeMode::Cluster, LatticeMode::Enrich] {
            let offsets: Vec<u64> = schedule(mode).iter().map(|s| s.at_ms).collect();
            assert_eq!(offsets, vec![0, 300, 600, 1500, 3000, 4500]);
        }
    }

    #[test]
    fn test_single_flight_guard() {
        let mut seq = Sequencer::new(LatticeMode::Filter);
        assert!(seq.activate(0));
        assert!(!seq.activate(10));
        assert!(!seq.activate(4699));

        // Run to completion, then a new run may start.
        let fired = seq.poll(4700);
        assert_eq!(fired.len(), 6);
        assert!(!seq.is_animating());
        assert!(seq.activate(5000));
    }

    #[test]
    fn test_steps_fire_once_in_order() {
        let mut seq = Sequencer::new(LatticeMode::Order);
        seq.activate(1000);

        assert_eq!(actions(&seq.poll(1000)), vec![StepAction::FadeOut]);
        assert!(seq.poll(1299).is_empty());
        assert_eq!(
            actions(&seq.poll(1650)),
            vec![StepAction::Baseline, StepAction::Reveal]
        );
        // Re-polling the same instant must not re-fire anything.
        assert!(seq.poll(1650).is_empty());
        assert_eq!(actions(&seq.poll(2500)), vec![StepAction::Working]);
        assert_eq!(
            actions(&seq.poll(10_000)),
            vec![StepAction::Terminal, StepAction::Settle]
        );
        assert!(!seq.is_animating());
    }

    #[test]
    fn test_fired_steps_carry_scheduled_time() {
        let mut seq = Sequencer::new(LatticeMode::Cluster);
        seq.activate(100);
        // A late poll still reports the scheduled timestamps.
        let fired = seq.poll(9999);
        let times: Vec<u64> = fired.iter().map(|f| f.at_ms).collect();
        assert_eq!(times, vec![100, 400, 700, 1600, 3100, 4600]);
    }

    #[test]
    fn test_animating_window_matches_table() {
        let mut seq = Sequencer::new(LatticeMode::Filter);
        assert!(!seq.is_animating());
        seq.activate(0);
        seq.poll(4699);
        assert!(seq.is_animating());
        seq.poll(4700);
        assert!(!seq.is_animating());
    }
}
