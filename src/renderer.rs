// Renderer Module - terminal drawing of the lattice surface
//
// The engine snapshot carries target attributes plus per-attribute
// transition durations; terminal cells cannot animate on their own, so this
// renderer keeps the displayed values and eases them toward the targets
// each frame. Positions and opacity use exponential smoothing scaled to the
// transition duration; fills crossfade through a two-stop gradient.

use crate::engine::Snapshot;
use crate::types::Rgba;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

struct EasedDot {
    x: f64,
    y: f64,
    opacity: f64,
    fill: Rgba,
    fill_from: Rgba,
    fill_to: Rgba,
    fill_elapsed_ms: f64,
    gradient: Option<colorgrad::Gradient>,
}

impl EasedDot {
    fn snapped(x: f64, y: f64, opacity: f64, fill: Rgba) -> Self {
        EasedDot {
            x,
            y,
            opacity,
            fill,
            fill_from: fill,
            fill_to: fill,
            fill_elapsed_ms: 0.0,
            gradient: None,
        }
    }
}

/// Displayed state of every dot, eased between frames.
pub struct LatticeRenderer {
    dots: Vec<EasedDot>,
    radius: f64,
}

impl Default for LatticeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl LatticeRenderer {
    pub fn new() -> Self {
        LatticeRenderer {
            dots: Vec::new(),
            radius: 0.0,
        }
    }

    /// Move the displayed attributes toward the snapshot targets.
    pub fn update(&mut self, snapshot: &Snapshot, dt_ms: f64) {
        // A population swap (enriching baseline/terminal) is a hard state
        // boundary: rebuild the display at the targets.
        if self.dots.len() != snapshot.dots.len() {
            self.dots = snapshot
                .dots
                .iter()
                .map(|d| EasedDot::snapped(d.x, d.y, d.opacity, d.fill))
                .collect();
            self.radius = snapshot.dots.first().map(|d| d.radius).unwrap_or(0.0);
            return;
        }

        if let Some(first) = snapshot.dots.first() {
            self.radius = ease_toward(self.radius, first.radius, dt_ms, first.transition.radius_ms);
        }

        for (shown, target) in self.dots.iter_mut().zip(snapshot.dots.iter()) {
            shown.x = ease_toward(shown.x, target.x, dt_ms, target.transition.position_ms);
            shown.y = ease_toward(shown.y, target.y, dt_ms, target.transition.position_ms);
            shown.opacity =
                ease_toward(shown.opacity, target.opacity, dt_ms, target.transition.opacity_ms);

            if target.transition.fill_ms == 0 {
                shown.fill = target.fill;
                shown.fill_to = target.fill;
                shown.gradient = None;
                continue;
            }

            // Retarget the crossfade whenever the destination fill changes.
            if target.fill != shown.fill_to {
                shown.fill_from = shown.fill;
                shown.fill_to = target.fill;
                shown.fill_elapsed_ms = 0.0;
                shown.gradient = build_crossfade(shown.fill_from, shown.fill_to);
            }

            if let Some(gradient) = &shown.gradient {
                shown.fill_elapsed_ms += dt_ms;
                let t = (shown.fill_elapsed_ms / target.transition.fill_ms as f64).clamp(0.0, 1.0);
                let [r, g, b, a] = gradient.at(t).to_rgba8();
                shown.fill = Rgba::new(r, g, b, a as f64 / 255.0);
                if t >= 1.0 {
                    shown.gradient = None;
                }
            } else {
                shown.fill = target.fill;
            }
        }
    }

    /// Render the lattice into the given area: one circle per dot plus the
    /// progress line sweeping across the top while a run is measured.
    pub fn draw(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let width = snapshot.width;
        let height = snapshot.height;
        let progress = snapshot.progress;
        let show_progress = snapshot.show_progress;

        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" hexagon lattice "),
            )
            .marker(symbols::Marker::Braille)
            .x_bounds([0.0, width])
            .y_bounds([0.0, height])
            .paint(|ctx| {
                // Canvas y grows upward; lattice rows grow downward.
                for dot in &self.dots {
                    let (r, g, b) = dot.fill.over_black(dot.opacity);
                    if (r, g, b) == (0, 0, 0) {
                        continue;
                    }
                    ctx.draw(&Circle {
                        x: dot.x,
                        y: height - dot.y,
                        radius: self.radius,
                        color: Color::Rgb(r, g, b),
                    });
                }

                if show_progress {
                    // Same sweep as the web UI's dash-offset line.
                    let x0 = width / 6.0;
                    let x1 = x0 + (width - 2.0 * width / 6.0) * progress;
                    let y = height - 30.0;
                    ctx.draw(&CanvasLine {
                        x1: x0,
                        y1: y,
                        x2: x1,
                        y2: y,
                        color: Color::White,
                    });
                }
            });
        frame.render_widget(canvas, area);
    }
}

/// Exponential smoothing toward a target, scaled so the value is within a
/// few percent of the target once the transition duration has elapsed.
/// Zero duration snaps.
fn ease_toward(current: f64, target: f64, dt_ms: f64, duration_ms: u64) -> f64 {
    if duration_ms == 0 || dt_ms <= 0.0 {
        return if duration_ms == 0 { target } else { current };
    }
    let k = 1.0 - (-4.0 * dt_ms / duration_ms as f64).exp();
    current + (target - current) * k.clamp(0.0, 1.0)
}

fn build_crossfade(from: Rgba, to: Rgba) -> Option<colorgrad::Gradient> {
    colorgrad::CustomGradient::new()
        .colors(&[
            colorgrad::Color::from_rgba8(from.r, from.g, from.b, (from.a * 255.0).round() as u8),
            colorgrad::Color::from_rgba8(to.r, to.g, to.b, (to.a * 255.0).round() as u8),
        ])
        .build()
        .ok()
}

/// Header line for the TUI: mode, phase, and the quit hint.
pub fn header_line(mode_label: &str, phase: &str, is_animating: bool) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("Lattice - {} ", mode_label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(format!("phase: {}", phase), Style::default().fg(Color::Yellow)),
        Span::raw(" | "),
        Span::styled(
            if is_animating { "running" } else { "idle" },
            Style::default().fg(if is_animating { Color::Green } else { Color::DarkGray }),
        ),
        Span::raw("   click/space: activate | 1-4: mode | q: quit"),
    ])
}

/// Footer status paragraph.
pub fn footer_paragraph(dots: usize, activations: u64, fps: f64, target_fps: f64) -> Paragraph<'static> {
    Paragraph::new(format!(
        "dots: {} | runs: {} | FPS: {:.1} / {:.1}",
        dots, activations, fps, target_fps
    ))
    .block(Block::default().borders(Borders::ALL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineParams, LatticeEngine};
    use crate::types::LatticeMode;

    #[test]
    fn test_ease_snaps_on_zero_duration() {
        assert_eq!(ease_toward(0.0, 10.0, 16.0, 0), 10.0);
    }

    #[test]
    fn test_ease_converges() {
        let mut v = 0.0;
        for _ in 0..200 {
            v = ease_toward(v, 10.0, 16.0, 500);
        }
        assert!((v - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_ease_moves_monotonically() {
        let stepped = ease_toward(0.0, 10.0, 16.0, 1500);
        assert!(stepped > 0.0 && stepped < 10.0);
    }

    #[test]
    fn test_update_tracks_population_swap() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Enrich, EngineParams::default(), 1);
        let mut renderer = LatticeRenderer::new();
        renderer.update(&engine.snapshot(), 16.0);
        assert_eq!(renderer.dots.len(), 37 * 3);

        engine.activate_at(0);
        engine.advance_to(300);
        renderer.update(&engine.snapshot(), 16.0);
        assert_eq!(renderer.dots.len(), 37 * 3);
    }

    #[test]
    fn test_crossfade_reaches_target() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Cluster, EngineParams::default(), 1);
        let mut renderer = LatticeRenderer::new();
        renderer.update(&engine.snapshot(), 16.0);

        engine.activate_at(0);
        engine.advance_to(1500);
        // Step well past every fill transition.
        for _ in 0..300 {
            renderer.update(&engine.snapshot(), 16.0);
        }
        let snapshot = engine.snapshot();
        for (shown, target) in renderer.dots.iter().zip(snapshot.dots.iter()) {
            assert_eq!(shown.fill, target.fill);
        }
    }
}
