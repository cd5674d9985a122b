// Enriching Mode - the coarse lattice densifies: either three tinted layers
// splitting apart on a hexagonal offset pattern, or a zoom onto a finer
// lattice, depending on configuration.

use crate::lattice::Point;
use crate::sequencer::Phase;
use crate::types::{Rgba, TransitionSpec};

/// Which enrichment rendition to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichStyle {
    /// Three overlapping color-tinted sub-lattices that split apart.
    Layers,
    /// Coarse lattice replaced by the fine lattice.
    Fine,
}

impl EnrichStyle {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "layers" => Some(EnrichStyle::Layers),
            "fine" => Some(EnrichStyle::Fine),
            _ => None,
        }
    }
}

/// Fill of the fine-lattice rendition.
pub const FINE_FILL: Rgba = Rgba::white(0.8);

/// Dot radius once the layers have split (the coarse radius is the
/// engine-wide default).
pub const SPLIT_RADIUS: f64 = 4.0;

/// One dot of a layered decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDot {
    pub pos: Point,
    pub color: Rgba,
}

fn layer_tints(bright: bool) -> [Rgba; 3] {
    // The cyan/magenta/yellow cluster tints; the aligned stack renders each
    // at a third of the muted alpha so the overlap reads as one dim lattice.
    let alpha = if bright { 0.8 } else { 0.033 };
    [
        Rgba::new(6, 182, 212, alpha),
        Rgba::new(236, 72, 153, alpha),
        Rgba::new(234, 179, 8, alpha),
    ]
}

/// The pre-working baseline: all three layers stacked on the base lattice,
/// nearly invisible.
pub fn aligned_layers(base: &[Point]) -> Vec<LayerDot> {
    let tints = layer_tints(false);
    let mut dots = Vec::with_capacity(base.len() * 3);
    for &pos in base {
        for &color in &tints {
            dots.push(LayerDot { pos, color });
        }
    }
    dots
}

/// The terminal state: each base dot splits into three tinted dots on a
/// half-pitch hexagonal offset pattern. The whole cluster is shifted back
/// by half an offset so it stays centered on the base dot.
pub fn offset_layers(base: &[Point], spacing: f64) -> Vec<LayerDot> {
    let half = spacing / 2.0;
    let hex_offset = half * 3.0_f64.sqrt() / 2.0;
    let tints = layer_tints(true);

    let mut dots = Vec::with_capacity(base.len() * 3);
    for &pos in base {
        let cx = pos.x - half / 2.0;
        let cy = pos.y - hex_offset / 2.0;

        // Cyan stays put, magenta steps right, yellow steps up-right.
        dots.push(LayerDot {
            pos: Point { x: cx, y: cy },
            color: tints[0],
        });
        dots.push(LayerDot {
            pos: Point { x: cx + half / 2.0, y: cy },
            color: tints[1],
        });
        dots.push(LayerDot {
            pos: Point {
                x: cx + half / 4.0,
                y: cy - hex_offset / 2.0,
            },
            color: tints[2],
        });
    }
    dots
}

pub fn opacity_of(phase: Phase) -> f64 {
    match phase {
        Phase::FadeOut | Phase::FadeIn => 0.0,
        _ => 1.0,
    }
}

/// No attribute animates on the initial reveal; the split itself glides
/// everything, radius included.
pub fn transition(initial_click: bool) -> TransitionSpec {
    if initial_click {
        TransitionSpec::none()
    } else {
        TransitionSpec {
            position_ms: 1000,
            opacity_ms: 1000,
            fill_ms: 1000,
            radius_ms: 1000,
        }
    }
}
