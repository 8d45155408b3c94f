//! Pan/zoom viewport and the screen ↔ world coordinate mapper.
//!
//! The renderer draws world content translated by `pan`, then scaled by
//! `zoom`, inside a canvas element whose top-left corner sits at `origin` in
//! screen space:
//!
//! ```text
//! screen = world * zoom + pan + origin
//! world  = (screen - origin - pan) / zoom
//! ```
//!
//! `zoom` is always clamped to `[MIN_ZOOM, MAX_ZOOM]`, so the inverse never
//! divides by zero.

use crate::defaults::{MAX_ZOOM, MIN_ZOOM, ZOOM_SENSITIVITY};
use crate::model::{Bounds, Point};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pan offset in screen pixels.
    pub x: f32,
    pub y: f32,
    /// Kept in range by every constructor and setter.
    zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Clamp a zoom factor into the supported range. Non-finite input falls
/// back to 1.0.
pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

impl Viewport {
    pub fn new(x: f32, y: f32, zoom: f32) -> Self {
        Self {
            x,
            y,
            zoom: clamp_zoom(zoom),
        }
    }

    /// Restore invariants on a viewport read from untrusted storage.
    pub fn sanitized(self) -> Self {
        let x = if self.x.is_finite() { self.x } else { 0.0 };
        let y = if self.y.is_finite() { self.y } else { 0.0 };
        Self::new(x, y, self.zoom)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Map a screen-space point to world space.
    pub fn screen_to_world(&self, screen: Point, origin: Point) -> Point {
        (screen - origin - self.pan()) / self.zoom
    }

    /// Map a world-space point to screen space (the rendering transform).
    pub fn world_to_screen(&self, world: Point, origin: Point) -> Point {
        world * self.zoom + self.pan() + origin
    }

    /// Convert a screen-space movement into a world-space movement.
    pub fn screen_delta_to_world(&self, dx: f32, dy: f32) -> Point {
        Point::new(dx / self.zoom, dy / self.zoom)
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = clamp_zoom(zoom);
    }

    /// Wheel handling: with ctrl/meta held the wheel zooms (scrolling down
    /// zooms out), otherwise it pans the canvas opposite to the scroll.
    pub fn apply_wheel(&mut self, dx: f32, dy: f32, zoom_modifier: bool) {
        if zoom_modifier {
            self.set_zoom(self.zoom - dy * ZOOM_SENSITIVITY);
        } else {
            self.pan_by(-dx, -dy);
        }
    }

    /// Multiply zoom by `factor`, keeping the world point under `anchor`
    /// (screen space) fixed on screen.
    pub fn zoom_around(&mut self, factor: f32, anchor: Point, origin: Point) {
        let world = self.screen_to_world(anchor, origin);
        self.set_zoom(self.zoom * factor);
        let pan = anchor - origin - world * self.zoom;
        self.x = pan.x;
        self.y = pan.y;
    }

    pub fn reset(&mut self) {
        *self = Viewport::default();
    }

    /// The world-space rectangle visible through a canvas of the given
    /// screen size.
    pub fn visible_world_rect(&self, width: f32, height: f32) -> Bounds {
        let top_left = self.screen_to_world(Point::ZERO, Point::ZERO);
        Bounds {
            x: top_left.x,
            y: top_left.y,
            width: width / self.zoom,
            height: height / self.zoom,
        }
    }

    /// World position at the centre of a canvas of the given screen size.
    pub fn screen_center_world(&self, width: f32, height: f32) -> Point {
        self.screen_to_world(Point::new(width / 2.0, height / 2.0), Point::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn identity_viewport_maps_through_origin() {
        let vp = Viewport::default();
        let origin = Point::new(10.0, 56.0);
        assert_eq!(
            vp.screen_to_world(Point::new(110.0, 156.0), origin),
            Point::new(100.0, 100.0)
        );
    }

    #[test]
    fn mapping_inverts_render_transform() {
        let origin = Point::new(0.0, 56.0);
        let mut vp = Viewport::default();
        let screen = Point::new(321.5, 187.25);
        let ops: [(f32, f32, f32); 5] = [
            (40.0, -12.0, 1.0),
            (0.0, 0.0, 2.5),
            (-300.0, 77.0, 0.5),
            (5.0, 5.0, 1.7),
            (0.0, 0.0, 0.1),
        ];
        for (dx, dy, zoom) in ops {
            vp.pan_by(dx, dy);
            vp.set_zoom(zoom);
            let world = vp.screen_to_world(screen, origin);
            assert!(approx(vp.world_to_screen(world, origin), screen));
        }
    }

    #[test]
    fn wheel_zoom_stays_in_range() {
        let mut vp = Viewport::default();
        for _ in 0..100 {
            vp.apply_wheel(0.0, -500.0, true);
            assert!(vp.zoom() <= MAX_ZOOM);
        }
        assert_eq!(vp.zoom(), MAX_ZOOM);
        for _ in 0..100 {
            vp.apply_wheel(0.0, 700.0, true);
            assert!(vp.zoom() >= MIN_ZOOM);
        }
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn plain_wheel_pans() {
        let mut vp = Viewport::default();
        vp.apply_wheel(10.0, 25.0, false);
        assert_eq!(vp.pan(), Point::new(-10.0, -25.0));
        assert_eq!(vp.zoom(), 1.0);
    }

    #[test]
    fn zoom_around_keeps_anchor_fixed() {
        let origin = Point::new(0.0, 0.0);
        let mut vp = Viewport::new(30.0, -20.0, 1.0);
        let anchor = Point::new(400.0, 300.0);
        let before = vp.screen_to_world(anchor, origin);
        vp.zoom_around(2.0, anchor, origin);
        assert_eq!(vp.zoom(), 2.0);
        assert!(approx(vp.screen_to_world(anchor, origin), before));
    }

    #[test]
    fn zoom_cannot_leave_range() {
        assert_eq!(Viewport::new(0.0, 0.0, 50.0).zoom(), MAX_ZOOM);
        assert_eq!(Viewport::new(0.0, 0.0, -1.0).zoom(), MIN_ZOOM);
        let mut vp = Viewport::default();
        vp.set_zoom(f32::INFINITY);
        assert_eq!(vp.zoom(), 1.0);
        vp.set_zoom(0.01);
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn sanitized_clamps_zoom_and_nan_pan() {
        let vp = Viewport {
            x: f32::NAN,
            y: 4.0,
            zoom: 0.0,
        }
        .sanitized();
        assert_eq!(vp, Viewport::new(0.0, 4.0, MIN_ZOOM));
    }
}
