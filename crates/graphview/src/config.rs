//! Configuration types for graph views.
//!
//! Two kinds of configuration reach a [`GraphView`](crate::GraphView):
//!
//! - [`ViewConfig`] - Static widget settings (animation timing, preview
//!   capture, fit padding, decoration defaults, path colors), typically
//!   loaded once from TOML with [`ViewConfig::from_toml_str`].
//! - [`EngineConfig`] - Per-update engine configuration supplied with every
//!   snapshot (style, requested viewport, named engine options). Only what
//!   changed since the previous update is applied, see [`EngineConfig::diff`].
//!
//! # Example
//!
//! ```
//! # use graphview::config::ViewConfig;
//! let config = ViewConfig::from_toml_str(
//!     r#"
//!     [animation]
//!     duration_ms = 250
//!
//!     [preview]
//!     debounce_secs = 1
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.animation().duration().as_millis(), 250);
//! assert_eq!(config.preview().debounce().as_secs(), 1);
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use graphview_core::{
    animation::{Animation, Easing},
    color::Color,
    geometry::Point,
};

use crate::{
    decoration::Padding,
    engine::{PreviewOptions, RenderEngine},
    error::ConfigError,
    reconcile::AnimationSettings,
    viewport::RequestedViewport,
};

/// Top-level widget configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    animation: AnimationConfig,

    #[serde(default)]
    ghost: GhostConfig,

    #[serde(default)]
    preview: PreviewConfig,

    #[serde(default)]
    viewport: ViewportConfig,

    #[serde(default)]
    decoration: DecorationConfig,

    #[serde(default)]
    paths: PathsConfig,
}

impl ViewConfig {
    /// Parses a TOML document. Missing sections and keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or mistyped values
    /// and [`ConfigError::Validation`] for values that parse but make no
    /// sense (an unparsable color, a zero debounce window).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        debug!(
            animation_ms = config.animation.duration_ms,
            debounce_secs = config.preview.debounce_secs;
            "Loaded view configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.paths.base_color()?;
        if self.preview.debounce_secs == 0 {
            return Err(ConfigError::Validation(
                "preview.debounce_secs must be at least 1".to_string(),
            ));
        }
        if self.viewport.panel_padding_border < 0.0 {
            return Err(ConfigError::Validation(
                "viewport.panel_padding_border must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn animation(&self) -> &AnimationConfig {
        &self.animation
    }

    pub fn ghost(&self) -> &GhostConfig {
        &self.ghost
    }

    pub fn preview(&self) -> &PreviewConfig {
        &self.preview
    }

    pub fn viewport(&self) -> &ViewportConfig {
        &self.viewport
    }

    pub fn decoration(&self) -> &DecorationConfig {
        &self.decoration
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Timing for reconciler-driven animations.
    pub fn animation_settings(&self) -> AnimationSettings {
        AnimationSettings {
            position: self.animation.to_animation(),
            ghost: self.ghost.to_animation(self.animation.easing),
        }
    }
}

/// Position and viewport animation timing.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_animation_ms")]
    duration_ms: u64,

    #[serde(default)]
    easing: Easing,
}

fn default_animation_ms() -> u64 {
    400
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_animation_ms(),
            easing: Easing::default(),
        }
    }
}

impl AnimationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn to_animation(&self) -> Animation {
        Animation::new(self.duration(), self.easing)
    }
}

/// Ghost entrance timing.
#[derive(Debug, Clone, Deserialize)]
pub struct GhostConfig {
    #[serde(default = "default_ghost_delay_ms")]
    delay_ms: u64,

    #[serde(default = "default_ghost_duration_ms")]
    duration_ms: u64,
}

fn default_ghost_delay_ms() -> u64 {
    100
}

fn default_ghost_duration_ms() -> u64 {
    800
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_ghost_delay_ms(),
            duration_ms: default_ghost_duration_ms(),
        }
    }
}

impl GhostConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn to_animation(&self, easing: Easing) -> Animation {
        Animation::new(self.duration(), easing).with_delay(self.delay())
    }
}

/// Preview image capture.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    /// Quiet period before a requested preview is captured.
    #[serde(default = "default_debounce_secs")]
    debounce_secs: u64,

    #[serde(default = "default_preview_extent")]
    max_width: u32,

    #[serde(default = "default_preview_extent")]
    max_height: u32,

    #[serde(default = "default_background")]
    background: String,

    #[serde(default = "default_full")]
    full: bool,
}

fn default_debounce_secs() -> u64 {
    3
}

fn default_preview_extent() -> u32 {
    300
}

fn default_background() -> String {
    "white".to_string()
}

fn default_full() -> bool {
    true
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            max_width: default_preview_extent(),
            max_height: default_preview_extent(),
            background: default_background(),
            full: default_full(),
        }
    }
}

impl PreviewConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub fn options(&self) -> PreviewOptions {
        PreviewOptions {
            background: self.background.clone(),
            full: self.full,
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }
}

/// Fit behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    /// Added to every side of the panel padding before fitting.
    #[serde(default = "default_panel_padding_border")]
    panel_padding_border: f32,
}

fn default_panel_padding_border() -> f32 {
    20.0
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            panel_padding_border: default_panel_padding_border(),
        }
    }
}

impl ViewportConfig {
    pub fn panel_padding_border(&self) -> f32 {
        self.panel_padding_border
    }
}

/// Decoration defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecorationConfig {
    #[serde(default)]
    padding: Padding,
}

impl DecorationConfig {
    /// Padding of decorations that carry none.
    pub fn padding(&self) -> Padding {
        self.padding
    }
}

/// Path highlighting.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_base_color")]
    base_color: String,
}

fn default_base_color() -> String {
    "#0088cc".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_color: default_base_color(),
        }
    }
}

impl PathsConfig {
    /// Color of the first path; later paths rotate its hue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the color cannot be parsed.
    pub fn base_color(&self) -> Result<Color, ConfigError> {
        Color::new(&self.base_color)
            .map_err(|err| ConfigError::Validation(format!("Invalid paths.base_color: {err}")))
    }
}

/// Engine configuration supplied with each update.
///
/// `style`, `pan` and `zoom` are handled specially; every other key is a
/// named engine option.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub style: Option<Value>,

    #[serde(default)]
    pub pan: Option<Point>,

    #[serde(default)]
    pub zoom: Option<f32>,

    #[serde(flatten)]
    pub options: IndexMap<String, Value>,
}

impl EngineConfig {
    pub fn with_style(mut self, style: Value) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_pan(mut self, pan: Point) -> Self {
        self.pan = Some(pan);
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// What to apply to move an engine configured with `previous` to `self`.
    ///
    /// Options are included when new or changed; the style only when it
    /// changed. The requested viewport is always carried over.
    pub fn diff(&self, previous: Option<&EngineConfig>) -> ConfigDiff {
        let options = self
            .options
            .iter()
            .filter(|(key, value)| {
                previous.is_none_or(|previous| previous.options.get(*key) != Some(*value))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let style = match (previous, &self.style) {
            (Some(previous), style) if previous.style == *style => None,
            (_, style) => style.clone(),
        };

        ConfigDiff {
            options,
            style,
            viewport: RequestedViewport {
                pan: self.pan,
                zoom: self.zoom,
            },
        }
    }
}

/// Output of [`EngineConfig::diff`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDiff {
    pub options: Vec<(String, Value)>,
    pub style: Option<Value>,
    pub viewport: RequestedViewport,
}

impl ConfigDiff {
    /// Applies options and style. Unknown options are logged and skipped.
    ///
    /// Returns the requested viewport for the caller to apply after the
    /// snapshot.
    pub fn apply(self, engine: &mut dyn RenderEngine) -> RequestedViewport {
        for (key, value) in &self.options {
            match engine.set_option(key, value) {
                Ok(()) => debug!(key; "Applied engine option"),
                Err(err) => warn!(key, err:%; "Skipping engine option"),
            }
        }
        if let Some(style) = &self.style {
            debug!("Applying style");
            engine.set_style(style);
        }
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::MemoryEngine;

    #[test]
    fn test_defaults() {
        let config = ViewConfig::default();
        assert_eq!(config.animation().duration(), Duration::from_millis(400));
        assert_eq!(config.ghost().delay(), Duration::from_millis(100));
        assert_eq!(config.ghost().duration(), Duration::from_millis(800));
        assert_eq!(config.preview().debounce(), Duration::from_secs(3));
        assert_eq!(config.preview().options(), PreviewOptions::default());
        assert_eq!(config.viewport().panel_padding_border(), 20.0);
        assert_eq!(config.decoration().padding(), Padding::new(8.0, 8.0));
        assert_eq!(config.paths().base_color().unwrap().to_css_hex(), "#0088cc");
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ViewConfig::from_toml_str("").unwrap();
        assert_eq!(config.animation_settings(), AnimationSettings::default());
    }

    #[test]
    fn test_full_document() {
        let config = ViewConfig::from_toml_str(
            r##"
            [animation]
            duration_ms = 200
            easing = { kind = "linear" }

            [ghost]
            delay_ms = 0

            [preview]
            max_width = 120
            background = "transparent"
            full = false

            [viewport]
            panel_padding_border = 5.0

            [decoration]
            padding = { x = 2.0 }

            [paths]
            base_color = "#ff0000"
            "##,
        )
        .unwrap();

        let settings = config.animation_settings();
        assert_eq!(settings.position.duration(), Duration::from_millis(200));
        assert_eq!(settings.position.easing(), Easing::Linear);
        assert_eq!(settings.ghost.delay(), Duration::ZERO);
        assert_eq!(settings.ghost.easing(), Easing::Linear);

        let preview = config.preview().options();
        assert_eq!(preview.max_width, 120);
        assert_eq!(preview.max_height, 300);
        assert_eq!(preview.background, "transparent");
        assert!(!preview.full);

        assert_eq!(config.viewport().panel_padding_border(), 5.0);
        assert_eq!(config.decoration().padding(), Padding::new(2.0, 8.0));
    }

    #[test]
    fn test_parse_error() {
        let err = ViewConfig::from_toml_str("[animation]\nduration_ms = \"slow\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors() {
        let err = ViewConfig::from_toml_str("[paths]\nbase_color = \"nope\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = ViewConfig::from_toml_str("[preview]\ndebounce_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_engine_config_from_props() {
        let config: EngineConfig = serde_json::from_value(json!({
            "style": [{"selector": "node"}],
            "pan": {"x": 10, "y": 20},
            "zoom": 2,
            "minZoom": 0.5,
        }))
        .unwrap();

        assert_eq!(config.pan, Some(Point::new(10.0, 20.0)));
        assert_eq!(config.zoom, Some(2.0));
        assert_eq!(config.options.len(), 1);
        assert_eq!(config.options["minZoom"], json!(0.5));
    }

    #[test]
    fn test_first_diff_applies_everything() {
        let config = EngineConfig::default()
            .with_style(json!([]))
            .with_option("minZoom", 0.5)
            .with_zoom(2.0);
        let diff = config.diff(None);

        assert_eq!(diff.options.len(), 1);
        assert_eq!(diff.style, Some(json!([])));
        assert_eq!(diff.viewport.zoom, Some(2.0));
    }

    #[test]
    fn test_diff_only_carries_changes() {
        let previous = EngineConfig::default()
            .with_style(json!([]))
            .with_option("minZoom", 0.5)
            .with_option("maxZoom", 4);
        let next = previous
            .clone()
            .with_option("maxZoom", 8)
            .with_pan(Point::new(1.0, 1.0));
        let diff = next.diff(Some(&previous));

        assert_eq!(diff.options, vec![("maxZoom".to_string(), json!(8))]);
        assert_eq!(diff.style, None);
        assert_eq!(diff.viewport.pan, Some(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_unknown_option_is_skipped() {
        let mut engine = MemoryEngine::new();
        let diff = EngineConfig::default()
            .with_option("noSuchSetter", true)
            .with_option("autolock", true)
            .diff(None);

        let viewport = diff.apply(&mut engine);
        assert!(viewport.is_empty());
        assert_eq!(engine.option("autolock"), Some(&json!(true)));
        assert_eq!(engine.option("noSuchSetter"), None);
    }
}
