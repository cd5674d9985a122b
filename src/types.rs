// Shared types module - Common types used across multiple modules

use anyhow::Result;
use serde::{Deserialize, Serialize};

// Mode exit reason - used to determine if we should quit or switch modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeExitReason {
    UserQuit,    // User pressed 'q' or Ctrl+C - should exit app
    ModeChanged, // Mode changed in config - should switch modes
}

/// The four lattice animation modes. Exactly one is active at a time;
/// Filter is the default when the configured mode string is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeMode {
    Filter,
    Order,
    Cluster,
    Enrich,
}

impl LatticeMode {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "filter" | "filtering" => Some(LatticeMode::Filter),
            "order" | "ordering" => Some(LatticeMode::Order),
            "cluster" | "clustering" => Some(LatticeMode::Cluster),
            "enrich" | "enriching" => Some(LatticeMode::Enrich),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LatticeMode::Filter => "filter",
            LatticeMode::Order => "order",
            LatticeMode::Cluster => "cluster",
            LatticeMode::Enrich => "enrich",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LatticeMode::Filter => "Filtering",
            LatticeMode::Order => "Ordering",
            LatticeMode::Cluster => "Clustering",
            LatticeMode::Enrich => "Enriching",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            LatticeMode::Filter => LatticeMode::Order,
            LatticeMode::Order => LatticeMode::Cluster,
            LatticeMode::Cluster => LatticeMode::Enrich,
            LatticeMode::Enrich => LatticeMode::Filter,
        }
    }
}

// RGBA color representation - every fill the lattice renders carries alpha
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Rgba { r, g, b, a }
    }

    /// Solid white at the given alpha (the workhorse of the ordering mode).
    pub const fn white(a: f64) -> Self {
        Rgba::new(255, 255, 255, a)
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgba {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
            a: 1.0,
        })
    }

    /// CSS literal, e.g. "rgba(6, 182, 212, 0.8)" - what the web UI paints with.
    pub fn css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }

    /// Composite over black at the given extra opacity. Terminal cells have
    /// no alpha channel, so the renderer flattens here.
    pub fn over_black(&self, opacity: f64) -> (u8, u8, u8) {
        let a = (self.a * opacity).clamp(0.0, 1.0);
        (
            (self.r as f64 * a).round() as u8,
            (self.g as f64 * a).round() as u8,
            (self.b as f64 * a).round() as u8,
        )
    }
}

/// Per-attribute transition durations for one dot, in milliseconds.
/// Zero means the attribute snaps. Mirrored into the web UI as a CSS
/// transition string; the terminal renderer eases with the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub position_ms: u64,
    pub opacity_ms: u64,
    pub fill_ms: u64,
    pub radius_ms: u64,
}

impl TransitionSpec {
    pub const fn none() -> Self {
        TransitionSpec {
            position_ms: 0,
            opacity_ms: 0,
            fill_ms: 0,
            radius_ms: 0,
        }
    }

    pub fn css(&self) -> String {
        let mut parts = Vec::new();
        if self.position_ms > 0 {
            parts.push(format!("cx {}ms ease", self.position_ms));
            parts.push(format!("cy {}ms ease", self.position_ms));
        }
        if self.opacity_ms > 0 {
            parts.push(format!("opacity {}ms ease", self.opacity_ms));
        }
        if self.fill_ms > 0 {
            parts.push(format!("fill {}ms ease", self.fill_ms));
        }
        if self.radius_ms > 0 {
            parts.push(format!("r {}ms ease", self.radius_ms));
        }
        parts.join(", ")
    }
}
