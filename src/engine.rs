// Engine Module - The lattice visualization surface
//
// Owns the geometry, the per-dot state arrays and the sequencer, applies
// the timed side effects for the active mode, and derives the renderable
// snapshot both frontends (terminal canvas and web UI) consume. The state
// arrays have exactly one writer: `advance_to`, called by whoever owns the
// engine. Renderers only ever see immutable snapshots.

use crate::clustering::{self, ClusterColor};
use crate::enriching::{self, EnrichStyle};
use crate::filtering;
use crate::lattice::{self, Point};
use crate::ordering;
use crate::sequencer::{FiredStep, Phase, Sequencer, StepAction, PROGRESS_SWEEP_MS};
use crate::types::{LatticeMode, Rgba, TransitionSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;

/// Geometry and visual parameters of the surface. All have defaults; none
/// are runtime-validated beyond config sanitization - they are shaped
/// configuration, not user data.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub width: f64,
    pub height: f64,
    pub spacing: f64,
    pub row_counts: Vec<usize>,
    pub circle_radius: f64,
    pub stroke_width: f64,
    pub fine_spacing: f64,
    pub fine_row_counts: Vec<usize>,
    pub enrich_style: EnrichStyle,
}

impl Default for EngineParams {
    fn default() -> Self {
        EngineParams {
            width: 300.0,
            height: 300.0,
            spacing: 25.0,
            row_counts: lattice::DEFAULT_ROW_COUNTS.to_vec(),
            circle_radius: 6.0,
            stroke_width: 0.5,
            fine_spacing: 12.5,
            fine_row_counts: vec![7, 8, 9, 10, 11, 12, 13, 12, 11, 10, 9, 8, 7],
            enrich_style: EnrichStyle::Layers,
        }
    }
}

/// The mutable per-dot state, parallel arrays one entry per rendered dot.
/// Swapped wholesale at phase boundaries; while enriching the population
/// itself changes (three layer dots per base dot, or the fine lattice).
#[derive(Debug, Clone)]
pub struct DotState {
    pub positions: Vec<Point>,
    pub opacities: Vec<f64>,
    pub colors: Vec<Rgba>,
    pub radius: f64,
}

impl DotState {
    fn uniform(positions: Vec<Point>, color: Rgba, radius: f64) -> Self {
        let n = positions.len();
        DotState {
            positions,
            opacities: vec![1.0; n],
            colors: vec![color; n],
            radius,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

/// One renderable circle of the scene graph.
#[derive(Debug, Clone, Serialize)]
pub struct DotView {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f64,
    pub opacity: f64,
    pub transition: TransitionSpec,
    /// The same transition as a ready-made CSS string for the web UI.
    pub transition_css: String,
}

/// Immutable per-frame view of the surface.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub mode: &'static str,
    pub phase: Phase,
    pub is_animating: bool,
    pub show_progress: bool,
    /// Progress indicator sweep position, 0..=1.
    pub progress: f64,
    /// Lifetime activation count (every trigger, started or not).
    pub activations: u64,
    pub width: f64,
    pub height: f64,
    pub dots: Vec<DotView>,
}

/// Emitted for every applied sequencer step; feeds the SSE event stream.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseEvent {
    pub phase: Phase,
    pub at_ms: u64,
}

pub struct LatticeEngine {
    params: EngineParams,
    mode: LatticeMode,
    lattice: Vec<Point>,
    fine_lattice: Vec<Point>,
    linear_ramp: Vec<f64>,
    cluster_target: Vec<ClusterColor>,
    selected: BTreeSet<usize>,
    cluster_hand: Vec<ClusterColor>,
    state: DotState,
    sequencer: Sequencer,
    phase: Phase,
    initial_click: bool,
    show_progress: bool,
    progress_started_ms: u64,
    last_now_ms: u64,
    epoch: Instant,
    rng: StdRng,
    on_activate: Option<Box<dyn Fn() + Send>>,
    activations: u64,
}

impl LatticeEngine {
    pub fn new(mode: LatticeMode, params: EngineParams) -> Self {
        Self::with_rng(mode, params, StdRng::from_entropy())
    }

    /// Deterministic construction for tests: every shuffle this engine
    /// performs comes out of the seeded generator.
    pub fn with_seed(mode: LatticeMode, params: EngineParams, seed: u64) -> Self {
        Self::with_rng(mode, params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mode: LatticeMode, params: EngineParams, rng: StdRng) -> Self {
        let lattice_points =
            lattice::generate_lattice(params.width, params.height, params.spacing, &params.row_counts);
        let fine_lattice = lattice::generate_fine_lattice(
            params.width,
            params.height,
            params.fine_spacing,
            &params.fine_row_counts,
        );
        let linear_ramp = ordering::linear_opacities(lattice_points.len());
        let cluster_target = clustering::target_configuration(&params.row_counts);
        let selected = filtering::target_selection(&params.row_counts);

        let mut engine = LatticeEngine {
            state: DotState::uniform(lattice_points.clone(), filtering::MUTED, params.circle_radius),
            phase: Phase::Selected,
            cluster_hand: cluster_target.clone(),
            sequencer: Sequencer::new(mode),
            lattice: lattice_points,
            fine_lattice,
            linear_ramp,
            cluster_target,
            selected,
            mode,
            params,
            initial_click: true,
            show_progress: false,
            progress_started_ms: 0,
            last_now_ms: 0,
            epoch: Instant::now(),
            rng,
            on_activate: None,
            activations: 0,
        };
        engine.enter_resting_state();
        engine
    }

    /// The component renders its end-state thumbnail at rest, not a neutral
    /// state: each mode starts parked on its own terminal configuration.
    fn enter_resting_state(&mut self) {
        match self.mode {
            LatticeMode::Filter => {
                self.state =
                    DotState::uniform(self.lattice.clone(), filtering::MUTED, self.params.circle_radius);
                self.phase = Phase::Selected;
            }
            LatticeMode::Order => {
                self.state = DotState::uniform(
                    self.lattice.clone(),
                    Rgba::white(1.0),
                    self.params.circle_radius,
                );
                // The ramp in canonical order *is* the arranged gradient.
                self.state.opacities = self.linear_ramp.clone();
                self.phase = Phase::Arranged;
            }
            LatticeMode::Cluster => {
                self.state = DotState::uniform(
                    self.lattice.clone(),
                    ClusterColor::White.rgba(),
                    self.params.circle_radius,
                );
                self.state.colors = self.cluster_target.iter().map(|c| c.rgba()).collect();
                self.cluster_hand = self.cluster_target.clone();
                self.phase = Phase::Arranged;
            }
            LatticeMode::Enrich => {
                self.apply_enrich_terminal();
                self.phase = Phase::Fine;
            }
        }
    }

    pub fn mode(&self) -> LatticeMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_animating(&self) -> bool {
        self.sequencer.is_animating()
    }

    /// Hook fired on every activation, whether or not a run starts - the
    /// hosting shell uses it for navigation, independent of the animation.
    pub fn set_on_activate(&mut self, callback: Box<dyn Fn() + Send>) {
        self.on_activate = Some(callback);
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// The external trigger. Starts the timed sequence unless one is
    /// already in flight (single-flight); returns whether a run started.
    pub fn activate(&mut self) -> bool {
        let now = self.now_ms();
        self.activate_at(now)
    }

    pub fn activate_at(&mut self, now_ms: u64) -> bool {
        self.activations += 1;
        if let Some(callback) = &self.on_activate {
            callback();
        }
        self.sequencer.activate(now_ms)
    }

    /// Advance the wall clock and apply whatever came due.
    pub fn tick(&mut self) -> Vec<PhaseEvent> {
        let now = self.now_ms();
        self.advance_to(now)
    }

    /// Apply all steps due at or before `now_ms`. The only place the
    /// per-dot state is ever written.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<PhaseEvent> {
        self.last_now_ms = self.last_now_ms.max(now_ms);
        let fired = self.sequencer.poll(now_ms);
        let mut events = Vec::with_capacity(fired.len());
        for step in fired {
            self.apply(step);
            events.push(PhaseEvent {
                phase: self.phase,
                at_ms: step.at_ms,
            });
        }
        events
    }

    fn apply(&mut self, step: FiredStep) {
        match step.action {
            StepAction::FadeOut => {
                self.phase = Phase::FadeOut;
            }
            StepAction::Baseline => {
                self.apply_baseline();
                self.phase = Phase::FadeIn;
                self.initial_click = true;
            }
            StepAction::Reveal => {
                self.phase = Phase::Initial;
                self.show_progress = true;
                self.progress_started_ms = step.at_ms;
                self.initial_click = false;
            }
            StepAction::Working => {
                self.apply_working();
            }
            StepAction::Terminal => {
                self.apply_terminal();
            }
            StepAction::Settle => {
                self.show_progress = false;
                if self.mode == LatticeMode::Filter {
                    self.phase = Phase::Selected;
                }
            }
        }
    }

    /// Reset the per-dot state to the pre-working baseline while hidden.
    fn apply_baseline(&mut self) {
        match self.mode {
            LatticeMode::Filter => {}
            LatticeMode::Order => {
                self.state.opacities = vec![ordering::BASELINE_OPACITY; self.state.len()];
            }
            LatticeMode::Cluster => {
                self.state.colors = vec![ClusterColor::White.rgba(); self.state.len()];
            }
            LatticeMode::Enrich => match self.params.enrich_style {
                EnrichStyle::Layers => {
                    let layers = enriching::aligned_layers(&self.lattice);
                    self.state = DotState {
                        positions: layers.iter().map(|d| d.pos).collect(),
                        opacities: vec![1.0; layers.len()],
                        colors: layers.iter().map(|d| d.color).collect(),
                        radius: self.params.circle_radius,
                    };
                }
                EnrichStyle::Fine => {
                    self.state = DotState::uniform(
                        self.lattice.clone(),
                        enriching::FINE_FILL,
                        self.params.circle_radius,
                    );
                }
            },
        }
    }

    /// Deal out the randomized working state.
    fn apply_working(&mut self) {
        match self.mode {
            LatticeMode::Filter => {
                self.phase = Phase::Selected;
            }
            LatticeMode::Order => {
                self.state.opacities = ordering::shuffled_opacities(&self.linear_ramp, &mut self.rng);
                self.state.positions = ordering::scattered_positions(&self.lattice, &mut self.rng);
                self.phase = Phase::Random;
            }
            LatticeMode::Cluster => {
                self.cluster_hand = clustering::random_colors(&self.cluster_target, &mut self.rng);
                self.state.colors = self.cluster_hand.iter().map(|c| c.rgba()).collect();
                self.phase = Phase::Random;
            }
            LatticeMode::Enrich => {
                self.phase = Phase::Coarse;
            }
        }
    }

    /// Assign the final configuration.
    fn apply_terminal(&mut self) {
        match self.mode {
            LatticeMode::Filter => {
                self.phase = Phase::Filtered;
            }
            LatticeMode::Order => {
                self.state.positions =
                    ordering::arranged_positions(&self.state.opacities, &self.lattice);
                self.phase = Phase::Arranged;
            }
            LatticeMode::Cluster => {
                self.state.positions = clustering::arranged_positions(
                    &self.cluster_hand,
                    &self.cluster_target,
                    &self.lattice,
                    &self.state.positions,
                );
                self.phase = Phase::Arranged;
            }
            LatticeMode::Enrich => {
                self.apply_enrich_terminal();
                self.phase = Phase::Fine;
            }
        }
    }

    fn apply_enrich_terminal(&mut self) {
        match self.params.enrich_style {
            EnrichStyle::Layers => {
                let layers = enriching::offset_layers(&self.lattice, self.params.spacing);
                self.state = DotState {
                    positions: layers.iter().map(|d| d.pos).collect(),
                    opacities: vec![1.0; layers.len()],
                    colors: layers.iter().map(|d| d.color).collect(),
                    radius: enriching::SPLIT_RADIUS,
                };
            }
            EnrichStyle::Fine => {
                self.state = DotState::uniform(
                    self.fine_lattice.clone(),
                    enriching::FINE_FILL,
                    enriching::SPLIT_RADIUS,
                );
            }
        }
    }

    fn progress(&self) -> f64 {
        if !self.show_progress {
            return 0.0;
        }
        let elapsed = self.last_now_ms.saturating_sub(self.progress_started_ms);
        (elapsed as f64 / PROGRESS_SWEEP_MS as f64).clamp(0.0, 1.0)
    }

    fn dot_view(&self, index: usize) -> DotView {
        let (fill, opacity, transition) = match self.mode {
            LatticeMode::Filter => {
                let is_selected = self.selected.contains(&index);
                (
                    filtering::fill_of(self.phase, is_selected),
                    filtering::opacity_of(self.phase, is_selected),
                    filtering::transition(),
                )
            }
            LatticeMode::Order => (
                ordering::fill_of(self.state.opacities[index]),
                ordering::opacity_of(self.phase),
                ordering::transition(self.initial_click),
            ),
            LatticeMode::Cluster => (
                self.state.colors[index],
                clustering::opacity_of(self.phase),
                clustering::transition(self.initial_click),
            ),
            LatticeMode::Enrich => (
                self.state.colors[index],
                enriching::opacity_of(self.phase),
                enriching::transition(self.initial_click),
            ),
        };

        let pos = self.state.positions[index];
        DotView {
            x: pos.x,
            y: pos.y,
            radius: self.state.radius,
            fill,
            stroke: Rgba::white(1.0),
            stroke_width: self.params.stroke_width,
            opacity,
            transition_css: transition.css(),
            transition,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode.as_str(),
            phase: self.phase,
            is_animating: self.sequencer.is_animating(),
            show_progress: self.show_progress,
            progress: self.progress(),
            activations: self.activations,
            width: self.params.width,
            height: self.params.height,
            dots: (0..self.state.len()).map(|i| self.dot_view(i)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn run_to(engine: &mut LatticeEngine, times: &[u64]) -> Vec<PhaseEvent> {
        let mut events = Vec::new();
        for &t in times {
            events.extend(engine.advance_to(t));
        }
        events
    }

    #[test]
    fn test_filtering_full_sequence() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Filter, EngineParams::default(), 1);
        assert_eq!(engine.phase(), Phase::Selected);
        assert!(!engine.is_animating());

        assert!(engine.activate_at(0));
        let events = run_to(&mut engine, &[0, 300, 600, 1500, 3500, 4699, 4700]);

        let observed: Vec<(Phase, u64)> = events.iter().map(|e| (e.phase, e.at_ms)).collect();
        assert_eq!(
            observed,
            vec![
                (Phase::FadeOut, 0),
                (Phase::FadeIn, 300),
                (Phase::Initial, 600),
                (Phase::Selected, 1500),
                (Phase::Filtered, 3500),
                (Phase::Selected, 4700),
            ]
        );
        assert!(!engine.is_animating());
        assert!(!engine.show_progress);
    }

    #[test]
    fn test_animating_window() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Filter, EngineParams::default(), 1);
        assert!(!engine.is_animating());
        engine.activate_at(0);
        assert!(engine.is_animating());
        engine.advance_to(4699);
        assert!(engine.is_animating());
        engine.advance_to(4700);
        assert!(!engine.is_animating());
    }

    #[test]
    fn test_single_flight_side_effects() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Order, EngineParams::default(), 2);
        assert!(engine.activate_at(0));
        engine.advance_to(100);
        // Re-triggering mid-run must not restart or double any step.
        assert!(!engine.activate_at(200));
        let events = run_to(&mut engine, &[300, 600, 1500, 3000, 4500]);
        assert_eq!(events.len(), 5);
        let randoms = events.iter().filter(|e| e.phase == Phase::Random).count();
        assert_eq!(randoms, 1);
        assert!(!engine.is_animating());
    }

    #[test]
    fn test_activation_callback_fires_every_time() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Filter, EngineParams::default(), 3);
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        engine.set_on_activate(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(engine.activate_at(0));
        assert!(!engine.activate_at(10)); // rejected by the guard...
        assert_eq!(count.load(Ordering::SeqCst), 2); // ...but still notified
        assert_eq!(engine.snapshot().activations, 2);
    }

    #[test]
    fn test_ordering_terminal_gradient() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Order, EngineParams::default(), 42);
        engine.activate_at(0);
        run_to(&mut engine, &[0, 300, 600, 1500, 3000]);
        assert_eq!(engine.phase(), Phase::Arranged);

        let snapshot = engine.snapshot();
        let lattice_points = lattice::generate_lattice(300.0, 300.0, 25.0, &lattice::DEFAULT_ROW_COUNTS);
        // Reading dots slot by slot in canonical order must give a
        // non-decreasing brightness ramp.
        let mut previous = 0.0;
        for slot in &lattice_points {
            let dot = snapshot
                .dots
                .iter()
                .find(|d| d.x == slot.x && d.y == slot.y)
                .expect("slot occupied");
            assert!(dot.fill.a >= previous);
            previous = dot.fill.a;
        }
    }

    #[test]
    fn test_clustering_terminal_configuration() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Cluster, EngineParams::default(), 7);
        engine.activate_at(0);
        run_to(&mut engine, &[0, 300, 600, 1500, 3000]);

        let snapshot = engine.snapshot();
        let lattice_points = lattice::generate_lattice(300.0, 300.0, 25.0, &lattice::DEFAULT_ROW_COUNTS);
        let center = lattice::center_subset(&lattice::DEFAULT_ROW_COUNTS);

        // Count per color in the terminal state.
        let white = ClusterColor::White.rgba();
        let whites: Vec<&DotView> = snapshot.dots.iter().filter(|d| d.fill == white).collect();
        assert_eq!(whites.len(), center.len());

        // Every white dot sits on a center-subset slot.
        for dot in whites {
            assert!(center
                .iter()
                .any(|&i| lattice_points[i].x == dot.x && lattice_points[i].y == dot.y));
        }

        for color in [ClusterColor::Cyan, ClusterColor::Magenta, ClusterColor::Yellow] {
            let count = snapshot
                .dots
                .iter()
                .filter(|d| d.fill == color.rgba())
                .count();
            assert_eq!(count, 10);
        }
    }

    #[test]
    fn test_enriching_layer_split() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Enrich, EngineParams::default(), 4);
        engine.activate_at(0);
        run_to(&mut engine, &[0, 300]);

        // Baseline: three dim layers per base dot, full radius.
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.dots.len(), 37 * 3);
        assert_eq!(snapshot.dots[0].radius, 6.0);
        assert!(snapshot.dots.iter().all(|d| d.fill.a < 0.05));

        run_to(&mut engine, &[600, 1500, 3000]);
        let snapshot = engine.snapshot();
        assert_eq!(engine.phase(), Phase::Fine);
        assert_eq!(snapshot.dots.len(), 37 * 3);
        assert_eq!(snapshot.dots[0].radius, enriching::SPLIT_RADIUS);
        assert!(snapshot.dots.iter().all(|d| d.fill.a > 0.5));
    }

    #[test]
    fn test_enriching_fine_variant() {
        let params = EngineParams {
            enrich_style: EnrichStyle::Fine,
            ..EngineParams::default()
        };
        let fine_count: usize = params.fine_row_counts.iter().sum();
        let mut engine = LatticeEngine::with_seed(LatticeMode::Enrich, params, 4);

        // Resting thumbnail is already the fine lattice.
        assert_eq!(engine.snapshot().dots.len(), fine_count);

        engine.activate_at(0);
        run_to(&mut engine, &[0, 300]);
        // Baseline returns to the coarse lattice...
        assert_eq!(engine.snapshot().dots.len(), 37);
        run_to(&mut engine, &[600, 1500, 3000]);
        // ...and the terminal state densifies it again.
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.dots.len(), fine_count);
        assert_eq!(snapshot.dots[0].radius, enriching::SPLIT_RADIUS);
    }

    #[test]
    fn test_progress_window() {
        let mut engine = LatticeEngine::with_seed(LatticeMode::Filter, EngineParams::default(), 5);
        engine.activate_at(0);
        run_to(&mut engine, &[0, 300]);
        assert!(!engine.snapshot().show_progress);
        engine.advance_to(600);
        let snapshot = engine.snapshot();
        assert!(snapshot.show_progress);
        assert_eq!(snapshot.progress, 0.0);

        engine.advance_to(600 + PROGRESS_SWEEP_MS / 2);
        assert!((engine.snapshot().progress - 0.5).abs() < 1e-9);

        engine.advance_to(4700);
        assert!(!engine.snapshot().show_progress);
    }

    #[test]
    fn test_resting_thumbnails() {
        let order = LatticeEngine::with_seed(LatticeMode::Order, EngineParams::default(), 1);
        assert_eq!(order.phase(), Phase::Arranged);
        let snapshot = order.snapshot();
        // Thumbnail already shows the monotonic ramp.
        let alphas: Vec<f64> = snapshot.dots.iter().map(|d| d.fill.a).collect();
        assert!(alphas.windows(2).all(|w| w[0] <= w[1]));

        let cluster = LatticeEngine::with_seed(LatticeMode::Cluster, EngineParams::default(), 1);
        assert_eq!(cluster.phase(), Phase::Arranged);
        assert!(!cluster.is_animating());
    }
}
