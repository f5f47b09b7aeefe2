// ============================================================================
// COORDINATE MODEL — percentage-relative layout math
// ============================================================================
//
// Every spatial value in a template (text position/size, subject box) is a
// percentage of one reference container. The functions here are pure: they
// take the container's current box explicitly and never read ambient layout,
// so callers must pass the bounds as they are at the moment of the event.

use serde::{Deserialize, Serialize};

/// The reference container's rendered box, in client (page) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerBounds {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A container anchored at the client origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// False for zero-area (collapsed or not yet laid out) containers.
    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Pixel dimensions for a raster covering the container.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.max(0.0).round() as u32,
            self.height.max(0.0).round() as u32,
        )
    }

    /// The container's own box in local pixels, edges inclusive.
    pub fn local_rect(&self) -> PixelRect {
        PixelRect {
            min_x: 0.0,
            min_y: 0.0,
            max_x: self.width,
            max_y: self.height,
        }
    }
}

/// A point in pixels. Whether it is client or container-local depends on
/// where it came from; the conversion functions below say which they expect.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point in percentage units of the container (0–100 nominally).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentPoint {
    pub x: f32,
    pub y: f32,
}

impl PercentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, delta: PercentPoint) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }
}

/// Convert a client-space point into container-local pixels.
pub fn client_to_local(point: PixelPoint, bounds: &ContainerBounds) -> PixelPoint {
    PixelPoint::new(point.x - bounds.left, point.y - bounds.top)
}

/// Container-local pixels → percentage. `None` for unusable containers.
pub fn local_to_percent(point: PixelPoint, bounds: &ContainerBounds) -> Option<PercentPoint> {
    if !bounds.is_usable() {
        return None;
    }
    Some(PercentPoint::new(
        point.x / bounds.width * 100.0,
        point.y / bounds.height * 100.0,
    ))
}

/// Percentage → container-local pixels.
pub fn percent_to_local(point: PercentPoint, bounds: &ContainerBounds) -> PixelPoint {
    PixelPoint::new(
        point.x / 100.0 * bounds.width,
        point.y / 100.0 * bounds.height,
    )
}

/// Pointer displacement in pixels → displacement in percentage points.
pub fn delta_to_percent(dx: f32, dy: f32, bounds: &ContainerBounds) -> Option<PercentPoint> {
    if !bounds.is_usable() {
        return None;
    }
    Some(PercentPoint::new(
        dx / bounds.width * 100.0,
        dy / bounds.height * 100.0,
    ))
}

/// Axis-aligned pixel rectangle (container-local).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl PixelRect {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, p: PixelPoint) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// A centre-anchored box in percentage units, as used by text elements and
/// the subject guide.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PercentRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PercentRect {
    pub fn to_pixels(&self, bounds: &ContainerBounds) -> PixelRect {
        let w = self.width / 100.0 * bounds.width;
        let h = self.height / 100.0 * bounds.height;
        let cx = self.x / 100.0 * bounds.width;
        let cy = self.y / 100.0 * bounds.height;
        PixelRect {
            min_x: cx - w * 0.5,
            min_y: cy - h * 0.5,
            max_x: cx + w * 0.5,
            max_y: cy + h * 0.5,
        }
    }

    /// Hit test against a container-local point.
    pub fn contains_local(&self, point: PixelPoint, bounds: &ContainerBounds) -> bool {
        bounds.is_usable() && self.to_pixels(bounds).contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn delta_is_relative_to_container_size() {
        let small = ContainerBounds::sized(800.0, 600.0);
        let d = delta_to_percent(80.0, 60.0, &small).unwrap();
        assert!(approx(d.x, 10.0) && approx(d.y, 10.0));

        // Same fractional displacement on a container twice the size.
        let large = ContainerBounds::new(40.0, 300.0, 1600.0, 1200.0);
        let d2 = delta_to_percent(160.0, 120.0, &large).unwrap();
        assert!(approx(d2.x, 10.0) && approx(d2.y, 10.0));
    }

    #[test]
    fn collapsed_container_yields_none() {
        let collapsed = ContainerBounds::sized(0.0, 600.0);
        assert!(delta_to_percent(5.0, 5.0, &collapsed).is_none());
        assert!(local_to_percent(PixelPoint::new(1.0, 1.0), &collapsed).is_none());
    }

    #[test]
    fn local_rect_covers_the_container() {
        let b = ContainerBounds::new(100.0, 50.0, 400.0, 200.0);
        let rect = b.local_rect();
        assert_eq!((rect.width(), rect.height()), (400.0, 200.0));
        assert!(rect.contains(client_to_local(PixelPoint::new(500.0, 250.0), &b)));
        assert!(!rect.contains(client_to_local(PixelPoint::new(99.0, 60.0), &b)));
        assert!(!rect.contains(client_to_local(PixelPoint::new(200.0, 251.0), &b)));
    }

    #[test]
    fn client_points_are_offset_by_container_origin() {
        let b = ContainerBounds::new(100.0, 50.0, 400.0, 200.0);
        let local = client_to_local(PixelPoint::new(300.0, 150.0), &b);
        assert_eq!(local, PixelPoint::new(200.0, 100.0));
        let pct = local_to_percent(local, &b).unwrap();
        assert!(approx(pct.x, 50.0) && approx(pct.y, 50.0));
        let back = percent_to_local(pct, &b);
        assert!(approx(back.x, 200.0) && approx(back.y, 100.0));
    }

    #[test]
    fn values_outside_range_are_not_clamped() {
        let b = ContainerBounds::sized(100.0, 100.0);
        let pct = local_to_percent(PixelPoint::new(-20.0, 150.0), &b).unwrap();
        assert!(approx(pct.x, -20.0) && approx(pct.y, 150.0));
    }

    #[test]
    fn centred_rect_to_pixels() {
        let b = ContainerBounds::sized(800.0, 600.0);
        let r = PercentRect { x: 50.0, y: 50.0, width: 50.0, height: 10.0 };
        let px = r.to_pixels(&b);
        assert!(approx(px.min_x, 200.0) && approx(px.max_x, 600.0));
        assert!(approx(px.min_y, 270.0) && approx(px.max_y, 330.0));
        assert!(r.contains_local(PixelPoint::new(400.0, 300.0), &b));
        assert!(!r.contains_local(PixelPoint::new(100.0, 300.0), &b));
    }
}
