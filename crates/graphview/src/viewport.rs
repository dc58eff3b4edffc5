//! Viewport math: fit-to-content, zoom around the canvas center, panning.
//!
//! The fit computation is a pure function ([`compute_fit`]); the
//! [`ViewportController`] gathers live geometry from the engine, runs it, and
//! either applies the result instantly or hands it to the engine's animation
//! scheduler.

use std::{cell::Cell, rc::Rc, time::Duration};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use graphview_core::{
    animation::Animation,
    geometry::{Bounds, Insets, Point, Size},
    identifier::ElementId,
};

use crate::engine::RenderEngine;

/// Pan and zoom of the canvas.
///
/// A model point `p` renders at `p * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f32,
}

impl Viewport {
    pub fn new(pan: Point, zoom: f32) -> Self {
        Self { pan, zoom }
    }

    /// Converts a screen-space point into model coordinates.
    pub fn to_model(&self, rendered: Point) -> Point {
        rendered.sub_point(self.pan).scale(1.0 / self.zoom)
    }

    /// Converts a model point into screen space.
    pub fn to_rendered(&self, model: Point) -> Point {
        model.scale(self.zoom).add_point(self.pan)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Point::default(), 1.0)
    }
}

/// Allowed zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: f32,
    pub max: f32,
}

impl ZoomBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamps `zoom` into the range. The result is always positive.
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.max(self.min).min(self.max).max(MIN_ZOOM)
    }
}

/// Smallest zoom the viewport ever takes, even with a zero configured floor.
pub const MIN_ZOOM: f32 = 1e-30;

impl Default for ZoomBounds {
    fn default() -> Self {
        Self::new(MIN_ZOOM, 1e30)
    }
}

/// Viewport change requested by the host through `pan`/`zoom` overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedViewport {
    #[serde(default)]
    pub pan: Option<Point>,
    #[serde(default)]
    pub zoom: Option<f32>,
}

impl RequestedViewport {
    pub fn is_empty(&self) -> bool {
        self.pan.is_none() && self.zoom.is_none()
    }

    /// Fills the missing half from `current`.
    pub fn resolve(&self, current: Viewport) -> Viewport {
        Viewport::new(
            self.pan.unwrap_or(current.pan),
            self.zoom.unwrap_or(current.zoom),
        )
    }
}

/// Result of [`compute_fit`]: the viewport to apply and the zoom range to
/// apply it under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPlan {
    pub viewport: Viewport,
    pub zoom_bounds: ZoomBounds,
}

/// Computes the viewport that fits `bbox` into `container` inside `padding`.
///
/// Never zooms in past 1. When the content needs a zoom below the configured
/// minimum, the range is widened to `[zoom, 1 / zoom]` so the fit still
/// succeeds; otherwise the configured range is restored. Returns `None` when
/// no finite positive zoom exists (for example when the padding consumes the
/// whole canvas).
///
/// # Examples
///
/// ```
/// use graphview::viewport::{compute_fit, ZoomBounds};
/// use graphview::geometry::{Bounds, Insets, Size};
///
/// let plan = compute_fit(
///     Bounds::new(0.0, 0.0, 400.0, 200.0),
///     Size::new(800.0, 600.0),
///     Insets::default(),
///     ZoomBounds::default(),
/// )
/// .unwrap();
/// assert_eq!(plan.viewport.zoom, 1.0);
/// assert_eq!(plan.viewport.pan.x(), 200.0);
/// assert_eq!(plan.viewport.pan.y(), 200.0);
/// ```
pub fn compute_fit(
    bbox: Bounds,
    container: Size,
    padding: Insets,
    configured: ZoomBounds,
) -> Option<FitPlan> {
    let (w, h) = (container.width(), container.height());
    let ratio = |available: f32, extent: f32| {
        if extent > 0.0 {
            available / extent
        } else {
            f32::INFINITY
        }
    };

    let zoom = 1.0_f32
        .min(ratio(w - padding.horizontal_sum(), bbox.width()))
        .min(ratio(h - padding.vertical_sum(), bbox.height()));
    if !zoom.is_finite() || zoom <= 0.0 {
        return None;
    }

    let zoom_bounds = if zoom < configured.min {
        ZoomBounds::new(zoom, 1.0 / zoom)
    } else {
        configured
    };
    let zoom = zoom_bounds.clamp(zoom);

    let pan = Point::new(
        (w + padding.left() - padding.right() - zoom * (bbox.min_x() + bbox.max_x())) / 2.0,
        (h + padding.top() - padding.bottom() - zoom * (bbox.min_y() + bbox.max_y())) / 2.0,
    );

    Some(FitPlan {
        viewport: Viewport::new(pan, zoom),
        zoom_bounds,
    })
}

/// Observes an animated fit. Completes when the engine finishes the
/// animation; a cancelled animation never completes.
#[derive(Debug, Clone, Default)]
pub struct FitCompletion {
    done: Rc<Cell<bool>>,
}

impl FitCompletion {
    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    fn signal(&self) -> impl FnOnce() + 'static {
        let done = Rc::clone(&self.done);
        move || done.set(true)
    }
}

/// What a fit request did.
#[derive(Debug, Clone)]
pub enum FitOutcome {
    /// No targets; the viewport was reset to its default.
    Reset,
    /// Applied instantly.
    Applied(Viewport),
    /// Handed to the engine's animation scheduler.
    Animating(Viewport, FitCompletion),
    /// The canvas has no usable size or the content cannot be fit.
    Skipped,
}

/// Navigation direction for the zoom buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

const ZOOM_ACCELERATION: f32 = 5.0;
const ZOOM_DAMPING: f32 = 0.8;
const ZOOM_REPEAT_WINDOW: Duration = Duration::from_millis(30);

/// Fit, zoom and pan operations against a live engine.
#[derive(Debug, Clone)]
pub struct ViewportController {
    configured: ZoomBounds,
    panel_padding_border: f32,
    animation: Animation,
    zoom_factor: f32,
    last_zoom_step: Option<Duration>,
}

impl ViewportController {
    pub fn new(configured: ZoomBounds, panel_padding_border: f32, animation: Animation) -> Self {
        Self {
            configured,
            panel_padding_border,
            animation,
            zoom_factor: 0.0,
            last_zoom_step: None,
        }
    }

    /// Zoom range the host configured, restored after a widened fit.
    pub fn configured_bounds(&self) -> ZoomBounds {
        self.configured
    }

    pub fn set_configured_bounds(&mut self, bounds: ZoomBounds) {
        self.configured = bounds;
    }

    /// Fits the viewport around `targets`.
    ///
    /// Only targets live in the engine count, and only their node geometry
    /// (labels excluded). `panel_padding` is grown by the configured border
    /// before fitting.
    pub fn fit(
        &self,
        engine: &mut dyn RenderEngine,
        targets: &[ElementId],
        panel_padding: Insets,
        animate: bool,
    ) -> FitOutcome {
        let bbox = Bounds::merge_all(
            targets
                .iter()
                .filter_map(|id| engine.live_geometry(*id))
                .map(|geometry| geometry.bounds()),
        );
        let Some(bbox) = bbox else {
            debug!("Nothing to fit, resetting viewport");
            engine.reset_viewport();
            return FitOutcome::Reset;
        };

        let Some(container) = engine.container_size() else {
            debug!("Container has no size, skipping fit");
            return FitOutcome::Skipped;
        };

        let padding = panel_padding.grow(self.panel_padding_border);
        let Some(plan) = compute_fit(bbox, container, padding, self.configured) else {
            debug!(width = bbox.width(), height = bbox.height(); "Content cannot be fit");
            return FitOutcome::Skipped;
        };

        info!(
            zoom = plan.viewport.zoom,
            pan_x = plan.viewport.pan.x(),
            pan_y = plan.viewport.pan.y(),
            animate;
            "Fitting viewport"
        );
        engine.set_zoom_bounds(plan.zoom_bounds);

        if animate {
            let completion = FitCompletion::default();
            engine.stop_viewport_animation();
            engine.animate_viewport(
                plan.viewport,
                self.animation,
                Some(Box::new(completion.signal())),
            );
            FitOutcome::Animating(plan.viewport, completion)
        } else {
            engine.set_viewport(plan.viewport);
            FitOutcome::Applied(plan.viewport)
        }
    }

    /// Animates to `level`, keeping the canvas center fixed on screen.
    pub fn zoom_to_level(&self, engine: &mut dyn RenderEngine, level: f32) -> Option<Viewport> {
        let target = zoom_around_center(engine, level)?;
        engine.stop_viewport_animation();
        engine.animate_viewport(target, self.animation, None);
        Some(target)
    }

    /// One press of a zoom button at time `now`.
    ///
    /// Presses closer together than the repeat window accelerate.
    pub fn zoom_step(
        &mut self,
        engine: &mut dyn RenderEngine,
        direction: ZoomDirection,
        now: Duration,
    ) -> Option<Viewport> {
        let since_last = self
            .last_zoom_step
            .and_then(|last| now.checked_sub(last))
            .filter(|dt| *dt < ZOOM_REPEAT_WINDOW);

        let dt = match since_last {
            Some(dt) => {
                let dt = dt.as_secs_f32();
                self.zoom_factor += ZOOM_ACCELERATION * dt * ZOOM_DAMPING;
                dt
            }
            None => {
                self.zoom_factor = 0.01;
                1.0
            }
        };
        self.last_zoom_step = Some(now);

        let sign = match direction {
            ZoomDirection::In => 1.0,
            ZoomDirection::Out => -1.0,
        };
        let level = engine.viewport().zoom + sign * self.zoom_factor * dt;
        let target = zoom_around_center(engine, level)?;
        engine.set_viewport(target);
        Some(target)
    }

    /// Moves the viewport by `offset` screen units.
    pub fn pan_by(&self, engine: &mut dyn RenderEngine, offset: Point) -> Viewport {
        let current = engine.viewport();
        let target = Viewport::new(current.pan.add_point(offset), current.zoom);
        engine.set_viewport(target);
        target
    }
}

fn zoom_around_center(engine: &dyn RenderEngine, level: f32) -> Option<Viewport> {
    let container = engine.container_size()?;
    let current = engine.viewport();
    let level = engine.zoom_bounds().clamp(level);
    if current.zoom <= 0.0 || !level.is_finite() {
        return None;
    }

    let center = Point::new(container.width() / 2.0, container.height() / 2.0);
    let ratio = level / current.zoom;
    let pan = Point::new(
        -ratio * (center.x() - current.pan.x()) + center.x(),
        -ratio * (center.y() - current.pan.y()) + center.y(),
    );
    Some(Viewport::new(pan, level))
}
