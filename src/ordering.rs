// Ordering Mode - brightness ramp scattered at random, then sorted into place

use crate::lattice::Point;
use crate::sequencer::Phase;
use crate::types::{Rgba, TransitionSpec};
use rand::seq::SliceRandom;
use rand::Rng;

/// Opacity every dot drops to before the working state is dealt out.
pub const BASELINE_OPACITY: f64 = 0.1;

/// The linear brightness ramp `(i+1)/n` for `n` dots. Index order; the
/// arranged thumbnail is this ramp laid out in canonical lattice order.
pub fn linear_opacities(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i + 1) as f64 / n as f64).collect()
}

/// A uniformly-shuffled copy of the ramp: the working-state hand.
pub fn shuffled_opacities<R: Rng>(ramp: &[f64], rng: &mut R) -> Vec<f64> {
    let mut shuffled = ramp.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// Scatter the dots across a random permutation of the lattice slots.
pub fn scattered_positions<R: Rng>(lattice: &[Point], rng: &mut R) -> Vec<Point> {
    let mut scattered = lattice.to_vec();
    scattered.shuffle(rng);
    scattered
}

/// Terminal mapping: each dot moves to the lattice slot of its ascending-
/// opacity rank, so traversing the lattice in canonical order reads the
/// ramp back monotonically.
pub fn arranged_positions(opacities: &[f64], lattice: &[Point]) -> Vec<Point> {
    let mut by_opacity: Vec<usize> = (0..opacities.len()).collect();
    by_opacity.sort_by(|&a, &b| opacities[a].total_cmp(&opacities[b]));

    let mut positions = vec![Point { x: 0.0, y: 0.0 }; opacities.len()];
    for (rank, &dot) in by_opacity.iter().enumerate() {
        positions[dot] = lattice[rank];
    }
    positions
}

/// Each dot's brightness is its fill: white at the dot's ramp value.
pub fn fill_of(opacity: f64) -> Rgba {
    Rgba::white(opacity)
}

/// Dots stay visible while moving; only the fade bracket hides them.
pub fn opacity_of(phase: Phase) -> f64 {
    match phase {
        Phase::FadeOut | Phase::FadeIn => 0.0,
        _ => 1.0,
    }
}

/// Slow position glide; fills only start animating after the first reveal
/// so the baseline swap doesn't smear.
pub fn transition(initial_click: bool) -> TransitionSpec {
    TransitionSpec {
        position_ms: 1500,
        opacity_ms: 1000,
        fill_ms: if initial_click { 0 } else { 1000 },
        radius_ms: 0,
    }
}
