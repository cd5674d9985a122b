// Clustering Mode - four-color partition gathered into rays around the center

use crate::lattice::{self, Point, DEFAULT_ROW_COUNTS};
use crate::sequencer::Phase;
use crate::types::{Rgba, TransitionSpec};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterColor {
    White,
    Cyan,
    Magenta,
    Yellow,
}

impl ClusterColor {
    pub fn rgba(self) -> Rgba {
        match self {
            ClusterColor::White => Rgba::white(0.1),
            ClusterColor::Cyan => Rgba::new(6, 182, 212, 0.8),
            ClusterColor::Magenta => Rgba::new(236, 72, 153, 0.8),
            ClusterColor::Yellow => Rgba::new(234, 179, 8, 0.8),
        }
    }
}

const ALL_COLORS: [ClusterColor; 4] = [
    ClusterColor::White,
    ClusterColor::Cyan,
    ClusterColor::Magenta,
    ClusterColor::Yellow,
];

/// The fixed end-state color of every lattice slot.
///
/// For the default 7-row shape this is the hand-laid arrangement: cyan and
/// magenta rays running diagonally out of the middle rows, yellow filling
/// the lower rows, white on the center hexagon. Other shapes have no
/// center subset, so they get a derived partition instead: contiguous
/// thirds of the index space for cyan/magenta/yellow and no white group.
pub fn target_configuration(row_counts: &[usize]) -> Vec<ClusterColor> {
    use ClusterColor::{Cyan as C, Magenta as M, White as W, Yellow as Y};

    if row_counts == DEFAULT_ROW_COUNTS.as_slice() {
        let rows: [&[ClusterColor]; 7] = [
            &[C, M, M, M],
            &[C, C, M, M, M],
            &[C, C, W, W, M, M],
            &[C, C, W, W, W, M, M],
            &[C, C, W, W, Y, Y],
            &[C, Y, Y, Y, Y],
            &[Y, Y, Y, Y],
        ];
        return rows.iter().flat_map(|row| row.iter().copied()).collect();
    }

    let n = lattice::dot_count(row_counts);
    let third = n / 3;
    (0..n)
        .map(|i| {
            if i < third {
                C
            } else if i < 2 * third {
                M
            } else {
                Y
            }
        })
        .collect()
}

/// Population of each color in a configuration, in `ALL_COLORS` order.
pub fn group_sizes(colors: &[ClusterColor]) -> [usize; 4] {
    let mut sizes = [0usize; 4];
    for &color in colors {
        let slot = ALL_COLORS.iter().position(|&c| c == color).unwrap_or(0);
        sizes[slot] += 1;
    }
    sizes
}

/// The working-state hand: every color repeated exactly as often as the
/// target configuration demands, dealt out in a uniform random order. Group
/// sizes are counted from the target, never assumed, so working and target
/// populations always match regardless of the lattice shape.
pub fn random_colors<R: Rng>(target: &[ClusterColor], rng: &mut R) -> Vec<ClusterColor> {
    let sizes = group_sizes(target);
    let mut hand = Vec::with_capacity(target.len());
    for (slot, &color) in ALL_COLORS.iter().enumerate() {
        hand.extend(std::iter::repeat(color).take(sizes[slot]));
    }
    hand.shuffle(rng);
    hand
}

/// Terminal mapping: the dots of each color move, index-for-index in their
/// original relative order, onto that color's target slots. If a color's
/// working population is larger than its target population the surplus dots
/// keep their prior position (lossy truncation, not an error).
pub fn arranged_positions(
    current: &[ClusterColor],
    target: &[ClusterColor],
    lattice: &[Point],
    prior: &[Point],
) -> Vec<Point> {
    let mut positions = prior.to_vec();

    for &color in &ALL_COLORS {
        let target_slots: Vec<usize> = (0..target.len())
            .filter(|&i| target[i] == color)
            .collect();
        let dots: Vec<usize> = (0..current.len())
            .filter(|&i| current[i] == color)
            .collect();

        for (i, &dot) in dots.iter().enumerate() {
            if let Some(&slot) = target_slots.get(i) {
                positions[dot] = lattice[slot];
            }
        }
    }

    positions
}

pub fn opacity_of(phase: Phase) -> f64 {
    match phase {
        Phase::FadeOut | Phase::FadeIn => 0.0,
        _ => 1.0,
    }
}

pub fn transition(initial_click: bool) -> TransitionSpec {
    TransitionSpec {
        position_ms: 1500,
        opacity_ms: 1000,
        fill_ms: if initial_click { 0 } else { 1000 },
        radius_ms: 0,
    }
}
