// Config Module - Configuration management and command-line argument parsing
use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::engine::EngineParams;
use crate::enriching::EnrichStyle;
use crate::lattice::DEFAULT_ROW_COUNTS;
use crate::types::LatticeMode;

// Global storage for custom config path
static CUSTOM_CONFIG_PATH: OnceLock<Option<String>> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Animated hexagon-lattice visualization with a filter proxy and cost estimator",
    long_about = "Renders a hexagonal lattice of dots in the terminal and drives it through\n\
                  four timed animation modes (filter, order, cluster, enrich). Click the\n\
                  canvas or press space to run a sequence. An embedded HTTP server mirrors\n\
                  the lattice to a browser and hosts the filter proxy endpoints."
)]
pub struct Args {
    /// Animation mode (filter, order, cluster, enrich)
    #[arg(long)]
    pub mode: Option<String>,

    /// Canvas width in lattice units
    #[arg(long)]
    pub width: Option<f64>,

    /// Canvas height in lattice units
    #[arg(long)]
    pub height: Option<f64>,

    /// Dot spacing
    #[arg(short = 's', long)]
    pub spacing: Option<f64>,

    /// Dot radius
    #[arg(short = 'r', long)]
    pub radius: Option<f64>,

    /// Per-row dot counts, comma separated (e.g. "4,5,6,7,6,5,4")
    #[arg(long)]
    pub rows: Option<String>,

    /// Enriching rendition: "layers" or "fine"
    #[arg(long)]
    pub enrich_style: Option<String>,

    /// Target framerate for the terminal renderer
    #[arg(long)]
    pub fps: Option<f64>,

    /// HTTP server port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Disable the HTTP server
    #[arg(long)]
    pub no_http: bool,

    /// Seed for the shuffled phases (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Config file path or name (e.g. --cfg /full/path or --cfg myconf for ~/.config/hexlattice/myconf.conf)
    #[arg(long)]
    pub cfg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>, // Stores the config file path (not serialized)

    pub mode: String, // Current mode: filter, order, cluster, enrich

    // Lattice geometry
    pub width: f64,
    pub height: f64,
    pub spacing: f64,
    pub row_counts: Vec<usize>,
    pub circle_radius: f64,
    pub stroke_width: f64,

    // Enriching geometry
    pub fine_spacing: f64,
    pub fine_row_counts: Vec<usize>,
    pub enrich_style: String, // "layers" or "fine"

    // Terminal renderer
    pub fps: f64,

    // HTTP server
    pub httpd_enabled: bool,
    pub httpd_ip: String,
    pub httpd_port: u16,
    pub httpd_auth_enabled: bool,
    pub httpd_auth_user: String,
    pub httpd_auth_pass: String,

    // Filter proxy upstream
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f64,
    pub llm_api_key_env: String, // Environment variable holding the API key

    // Filtering demo pacing
    pub demo_item_delay_ms: u64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig {
            config_path: None,
            mode: "filter".to_string(),
            width: 300.0,
            height: 300.0,
            spacing: 25.0,
            row_counts: DEFAULT_ROW_COUNTS.to_vec(),
            circle_radius: 6.0,
            stroke_width: 0.5,
            fine_spacing: 12.5,
            fine_row_counts: vec![7, 8, 9, 10, 11, 12, 13, 12, 11, 10, 9, 8, 7],
            enrich_style: "layers".to_string(),
            fps: 30.0,
            httpd_enabled: true,
            httpd_ip: "127.0.0.1".to_string(),
            httpd_port: 8787,
            httpd_auth_enabled: false,
            httpd_auth_user: String::new(),
            httpd_auth_pass: String::new(),
            llm_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model: "openai/gpt-4.1-mini".to_string(),
            llm_max_tokens: 10,
            llm_temperature: 0.0,
            llm_api_key_env: "OPENROUTER_API_KEY".to_string(),
            demo_item_delay_ms: 500,
        }
    }
}

impl LatticeConfig {
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        // Track if any args were actually provided
        let mut args_provided = false;

        if let Some(ref mode) = args.mode {
            self.mode = mode.clone();
            args_provided = true;
        }

        if let Some(width) = args.width {
            self.width = width;
            args_provided = true;
        }

        if let Some(height) = args.height {
            self.height = height;
            args_provided = true;
        }

        if let Some(spacing) = args.spacing {
            self.spacing = spacing;
            args_provided = true;
        }

        if let Some(radius) = args.radius {
            self.circle_radius = radius;
            args_provided = true;
        }

        if let Some(ref rows) = args.rows {
            let parsed: Vec<usize> = rows
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                self.row_counts = parsed;
                args_provided = true;
            }
        }

        if let Some(ref style) = args.enrich_style {
            self.enrich_style = style.clone();
            args_provided = true;
        }

        if let Some(fps) = args.fps {
            self.fps = fps;
            args_provided = true;
        }

        if let Some(port) = args.port {
            self.httpd_port = port;
            args_provided = true;
        }

        if args.no_http {
            self.httpd_enabled = false;
            args_provided = true;
        }

        args_provided
    }

    /// Set the global config path (called once at startup)
    pub fn set_config_path(cfg: Option<String>) {
        let _ = CUSTOM_CONFIG_PATH.set(cfg);
    }

    /// Get the global config path (if set)
    fn get_config_path_arg() -> Option<&'static str> {
        CUSTOM_CONFIG_PATH.get().and_then(|opt| opt.as_deref())
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        // Priority: explicit arg > global > default location
        let cfg = cfg_arg.or_else(|| Self::get_config_path_arg());

        if let Some(cfg) = cfg {
            let path = PathBuf::from(cfg);
            if path.is_absolute() {
                return Ok(path);
            }

            // Relative paths pass through untouched
            if cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Otherwise treat as config name in the config directory
            let config_dir = Self::config_dir()?;
            let filename = if cfg.ends_with(".conf") {
                cfg.to_string()
            } else {
                format!("{}.conf", cfg)
            };
            Ok(config_dir.join(filename))
        } else {
            Ok(Self::config_dir()?.join("config.conf"))
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        let config_dir = PathBuf::from(home).join(".config").join("hexlattice");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(cfg_arg: Option<&str>) -> Result<Self> {
        let path = Self::config_path(cfg_arg)?;
        let contents = std::fs::read_to_string(&path)?;
        let mut parsed: Self = toml::from_str(&contents)?;
        parsed.config_path = Some(path);
        parsed.sanitize();
        Ok(parsed)
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        self.mode = self.mode.trim().to_lowercase();
        self.enrich_style = self.enrich_style.trim().to_lowercase();
        self.httpd_ip = self.httpd_ip.trim().to_string();
        self.httpd_auth_user = self.httpd_auth_user.trim().to_string();
        self.llm_base_url = self.llm_base_url.trim().trim_end_matches('/').to_string();
        self.llm_model = self.llm_model.trim().to_string();
        self.llm_api_key_env = self.llm_api_key_env.trim().to_string();

        // Clamp numeric values to reasonable ranges
        self.width = self.width.clamp(50.0, 4000.0);
        self.height = self.height.clamp(50.0, 4000.0);
        self.spacing = self.spacing.clamp(1.0, 200.0);
        self.circle_radius = self.circle_radius.clamp(0.5, 50.0);
        self.stroke_width = self.stroke_width.clamp(0.0, 10.0);
        self.fine_spacing = self.fine_spacing.clamp(1.0, 200.0);
        self.fps = self.fps.clamp(1.0, 240.0);
        self.llm_max_tokens = self.llm_max_tokens.clamp(1, 1024);
        self.llm_temperature = self.llm_temperature.clamp(0.0, 2.0);
        self.demo_item_delay_ms = self.demo_item_delay_ms.min(10_000);

        // A lattice needs at least one non-empty row
        self.row_counts.retain(|&count| count > 0 && count <= 64);
        if self.row_counts.is_empty() {
            self.row_counts = DEFAULT_ROW_COUNTS.to_vec();
        }
        self.fine_row_counts.retain(|&count| count > 0 && count <= 128);
        if self.fine_row_counts.is_empty() {
            self.fine_row_counts = LatticeConfig::default().fine_row_counts;
        }

        if EnrichStyle::from_string(&self.enrich_style).is_none() {
            self.enrich_style = "layers".to_string();
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::config_path(None)?,
        };

        // Sanitize values before saving
        let mut sanitized = self.clone();
        sanitized.sanitize();

        // Build TOML with comments manually for better documentation
        let contents = format!(
            r#"# hexlattice Configuration File
# Edit this file while the program is running to change settings in real-time
# Note: All changes apply automatically without restart

# Animation mode: filter, order, cluster, enrich
mode = "{mode}"

# Canvas size in lattice units (the coordinate space dots live in)
width = {width}
height = {height}

# Dot spacing and per-row dot counts (rows are stacked at hexagonal pitch)
spacing = {spacing}
row_counts = {row_counts:?}

# Dot rendering
circle_radius = {circle_radius}
stroke_width = {stroke_width}

# Enriching mode geometry: the denser lattice and which rendition to run
# ("layers" = three tinted sub-lattices split apart, "fine" = zoom to the
# fine lattice)
fine_spacing = {fine_spacing}
fine_row_counts = {fine_row_counts:?}
enrich_style = "{enrich_style}"

# Terminal renderer target framerate
fps = {fps}

# Embedded HTTP server (web mirror of the lattice + API endpoints)
httpd_enabled = {httpd_enabled}
httpd_ip = "{httpd_ip}"
httpd_port = {httpd_port}
httpd_auth_enabled = {httpd_auth_enabled}
httpd_auth_user = "{httpd_auth_user}"
httpd_auth_pass = "{httpd_auth_pass}"

# Filter proxy upstream (OpenAI-compatible chat completions)
llm_base_url = "{llm_base_url}"
llm_model = "{llm_model}"
llm_max_tokens = {llm_max_tokens}
llm_temperature = {llm_temperature}
llm_api_key_env = "{llm_api_key_env}"

# Pause between filtering-demo requests in milliseconds
demo_item_delay_ms = {demo_item_delay_ms}
"#,
            mode = sanitized.mode,
            width = sanitized.width,
            height = sanitized.height,
            spacing = sanitized.spacing,
            row_counts = sanitized.row_counts,
            circle_radius = sanitized.circle_radius,
            stroke_width = sanitized.stroke_width,
            fine_spacing = sanitized.fine_spacing,
            fine_row_counts = sanitized.fine_row_counts,
            enrich_style = sanitized.enrich_style,
            fps = sanitized.fps,
            httpd_enabled = sanitized.httpd_enabled,
            httpd_ip = sanitized.httpd_ip,
            httpd_port = sanitized.httpd_port,
            httpd_auth_enabled = sanitized.httpd_auth_enabled,
            httpd_auth_user = sanitized.httpd_auth_user,
            httpd_auth_pass = sanitized.httpd_auth_pass,
            llm_base_url = sanitized.llm_base_url,
            llm_model = sanitized.llm_model,
            llm_max_tokens = sanitized.llm_max_tokens,
            llm_temperature = sanitized.llm_temperature,
            llm_api_key_env = sanitized.llm_api_key_env,
            demo_item_delay_ms = sanitized.demo_item_delay_ms,
        );

        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// The active animation mode; unknown strings fall back to filtering.
    pub fn lattice_mode(&self) -> LatticeMode {
        LatticeMode::from_string(&self.mode).unwrap_or(LatticeMode::Filter)
    }

    /// Engine parameters derived from this config.
    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            width: self.width,
            height: self.height,
            spacing: self.spacing,
            row_counts: self.row_counts.clone(),
            circle_radius: self.circle_radius,
            stroke_width: self.stroke_width,
            fine_spacing: self.fine_spacing,
            fine_row_counts: self.fine_row_counts.clone(),
            enrich_style: EnrichStyle::from_string(&self.enrich_style)
                .unwrap_or(EnrichStyle::Layers),
        }
    }

    /// True when a change requires rebuilding the engine (geometry or mode).
    pub fn engine_changed(&self, other: &LatticeConfig) -> bool {
        self.mode != other.mode
            || self.width != other.width
            || self.height != other.height
            || self.spacing != other.spacing
            || self.row_counts != other.row_counts
            || self.circle_radius != other.circle_radius
            || self.stroke_width != other.stroke_width
            || self.fine_spacing != other.fine_spacing
            || self.fine_row_counts != other.fine_row_counts
            || self.enrich_style != other.enrich_style
    }
}
