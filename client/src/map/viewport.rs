//! Viewport state: center, zoom and screen size, with geo <-> screen conversion

use super::config::MapConfig;
use super::projection::{
    clamp_latitude, geo_to_tile, geo_to_world_pixel, normalize_longitude, tile_origin_world_pixel,
    tile_zoom, world_pixel_to_geo, GeoPoint, ScreenPoint, TileAddress, WorldPoint, TILE_SIZE,
};

/// Drag start captured when a pan begins.
///
/// Panning is always computed from this anchor rather than accumulated per
/// frame, so long drags do not drift.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanAnchor {
    pub start_screen: ScreenPoint,
    pub start_center: GeoPoint,
}

/// Map viewport
#[derive(Clone, Debug)]
pub struct Viewport {
    center: GeoPoint,
    zoom: f64,
    width: u32,
    height: u32,

    zoom_min: f64,
    zoom_max: f64,
    lat_clamp: f64,
    default_center: GeoPoint,
    default_zoom: f64,
}

impl Viewport {
    /// Viewport at the configured default center and zoom
    pub fn new(config: &MapConfig, width: u32, height: u32) -> Self {
        let mut viewport = Self {
            center: config.default_center,
            zoom: config.default_zoom,
            width,
            height,
            zoom_min: config.zoom_min,
            zoom_max: config.zoom_max,
            lat_clamp: config.lat_clamp,
            default_center: config.default_center,
            default_zoom: config.default_zoom,
        };
        viewport.reset();
        viewport
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Update viewport size; center and zoom are kept
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Restore the configured default center and zoom
    pub fn reset(&mut self) {
        self.center = self.sanitize(self.default_center);
        self.zoom = self.clamp_zoom(self.default_zoom);
    }

    fn half_size(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    fn center_world(&self) -> WorldPoint {
        geo_to_world_pixel(self.center, self.zoom)
    }

    pub fn geo_to_screen(&self, p: GeoPoint) -> ScreenPoint {
        let world = geo_to_world_pixel(p, self.zoom);
        let center = self.center_world();
        let (half_w, half_h) = self.half_size();
        ScreenPoint::new(world.x - center.x + half_w, world.y - center.y + half_h)
    }

    pub fn screen_to_geo(&self, s: ScreenPoint) -> GeoPoint {
        let center = self.center_world();
        let (half_w, half_h) = self.half_size();
        let world = WorldPoint::new(s.x - half_w + center.x, s.y - half_h + center.y);
        world_pixel_to_geo(world, self.zoom)
    }

    /// Move the center so the point under `anchor.start_screen` ends up
    /// under `anchor.start_screen + (dx, dy)`
    pub fn pan(&mut self, anchor: &PanAnchor, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let start = geo_to_world_pixel(anchor.start_center, self.zoom);
        let moved = WorldPoint::new(start.x - dx, start.y - dy);
        self.center = self.sanitize(world_pixel_to_geo(moved, self.zoom));
    }

    /// Change zoom while keeping the geographic point under `anchor` fixed
    pub fn zoom_anchored(&mut self, new_zoom: f64, anchor: ScreenPoint) {
        if !new_zoom.is_finite() || !anchor.x.is_finite() || !anchor.y.is_finite() {
            return;
        }
        let target = self.clamp_zoom(new_zoom);
        if target == self.zoom {
            return;
        }

        let pinned = self.screen_to_geo(anchor);
        self.zoom = target;

        let pinned_world = geo_to_world_pixel(pinned, self.zoom);
        let (half_w, half_h) = self.half_size();
        let center_world = WorldPoint::new(
            pinned_world.x - (anchor.x - half_w),
            pinned_world.y - (anchor.y - half_h),
        );
        self.center = self.sanitize(world_pixel_to_geo(center_world, self.zoom));
    }

    /// Zoom centered on the viewport midpoint
    pub fn zoom_by(&mut self, delta: f64) {
        let (half_w, half_h) = self.half_size();
        self.zoom_anchored(self.zoom + delta, ScreenPoint::new(half_w, half_h));
    }

    /// Every tile intersecting the viewport at the integer zoom, with a
    /// one-tile margin on all sides
    pub fn visible_tiles(&self) -> Vec<TileAddress> {
        let z = tile_zoom(self.zoom);
        let scale = 2.0_f64.powf(self.zoom - z as f64);
        let (cx, cy) = geo_to_tile(self.center, z as f64);
        let (half_w, half_h) = self.half_size();

        let tile_px = TILE_SIZE * scale;
        let min_x = (cx - half_w / tile_px).floor() as i32 - 1;
        let max_x = (cx + half_w / tile_px).floor() as i32 + 1;
        let min_y = (cy - half_h / tile_px).floor() as i32 - 1;
        let max_y = (cy + half_h / tile_px).floor() as i32 + 1;

        let mut tiles = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)).max(0) as usize);
        for ty in min_y..=max_y {
            for tx in min_x..=max_x {
                tiles.push(TileAddress::new(z, tx, ty));
            }
        }
        tiles
    }

    /// Top-left screen position and display size of a tile at the current zoom
    pub fn tile_screen_rect(&self, tile: &TileAddress) -> (ScreenPoint, f64) {
        let origin = tile_origin_world_pixel(tile, self.zoom);
        let center = self.center_world();
        let (half_w, half_h) = self.half_size();
        let size = TILE_SIZE * 2.0_f64.powf(self.zoom - tile.z as f64);
        (
            ScreenPoint::new(origin.x - center.x + half_w, origin.y - center.y + half_h),
            size,
        )
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.zoom_min, self.zoom_max)
    }

    fn sanitize(&self, p: GeoPoint) -> GeoPoint {
        GeoPoint::new(
            clamp_latitude(p.lat, self.lat_clamp),
            normalize_longitude(p.lon),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn moscow() -> Viewport {
        Viewport::new(&MapConfig::default(), 800, 600)
    }

    #[test]
    fn test_center_maps_to_midpoint_exactly() {
        let viewport = moscow();
        assert_eq!(viewport.center(), GeoPoint::new(55.7558, 37.6173));
        assert_eq!(viewport.zoom(), 11.0);
        assert_eq!(viewport.geo_to_screen(viewport.center()), ScreenPoint::new(400.0, 300.0));
    }

    #[test]
    fn test_zoom_at_midpoint_keeps_center() {
        let mut viewport = moscow();
        viewport.zoom_anchored(12.0, ScreenPoint::new(400.0, 300.0));
        assert_eq!(viewport.zoom(), 12.0);
        assert_abs_diff_eq!(viewport.center().lat, 55.7558, epsilon = 1e-9);
        assert_abs_diff_eq!(viewport.center().lon, 37.6173, epsilon = 1e-9);
    }

    #[test]
    fn test_screen_geo_inverse() {
        let viewport = moscow();
        for s in [
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(800.0, 600.0),
            ScreenPoint::new(123.4, 567.8),
        ] {
            let back = viewport.geo_to_screen(viewport.screen_to_geo(s));
            assert_abs_diff_eq!(back.x, s.x, epsilon = 1e-6);
            assert_abs_diff_eq!(back.y, s.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pan_keeps_grabbed_point_under_pointer() {
        let mut viewport = moscow();
        let start = ScreenPoint::new(250.0, 410.0);
        let grabbed = viewport.screen_to_geo(start);
        let anchor = PanAnchor {
            start_screen: start,
            start_center: viewport.center(),
        };

        // Several intermediate moves, all computed from the same anchor
        for (dx, dy) in [(3.0, -1.0), (40.0, 12.5), (-75.25, 130.0)] {
            viewport.pan(&anchor, dx, dy);
            let now = viewport.geo_to_screen(grabbed);
            assert_abs_diff_eq!(now.x, start.x + dx, epsilon = 1e-6);
            assert_abs_diff_eq!(now.y, start.y + dy, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zoom_anchor_invariant() {
        for anchor in [
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(700.0, 80.0),
            ScreenPoint::new(512.3, 599.0),
        ] {
            for target in [9.0, 10.4, 13.7, 17.0] {
                let mut viewport = moscow();
                let pinned = viewport.screen_to_geo(anchor);
                let before = viewport.geo_to_screen(pinned);
                viewport.zoom_anchored(target, anchor);
                let after = viewport.geo_to_screen(pinned);
                assert!(before.distance(anchor) < 1.0);
                assert!(after.distance(anchor) < 1.0, "{anchor:?} at {target}: {after:?}");
            }
        }
    }

    #[test]
    fn test_zoom_clamp_is_idempotent() {
        let mut viewport = moscow();
        let anchor = ScreenPoint::new(100.0, 100.0);

        viewport.zoom_anchored(42.0, anchor);
        assert_eq!(viewport.zoom(), 17.0);
        let center = viewport.center();
        viewport.zoom_anchored(18.0, anchor);
        assert_eq!(viewport.zoom(), 17.0);
        assert_eq!(viewport.center(), center);

        viewport.zoom_anchored(-5.0, anchor);
        assert_eq!(viewport.zoom(), 9.0);
        let center = viewport.center();
        viewport.zoom_anchored(8.7, anchor);
        assert_eq!(viewport.zoom(), 9.0);
        assert_eq!(viewport.center(), center);
    }

    #[test]
    fn test_non_finite_zoom_ignored() {
        let mut viewport = moscow();
        viewport.zoom_anchored(f64::NAN, ScreenPoint::new(10.0, 10.0));
        viewport.zoom_anchored(f64::INFINITY, ScreenPoint::new(10.0, 10.0));
        assert_eq!(viewport.zoom(), 11.0);
    }

    #[test]
    fn test_latitude_clamped_after_pan() {
        let mut viewport = moscow();
        let anchor = PanAnchor {
            start_screen: ScreenPoint::new(400.0, 300.0),
            start_center: viewport.center(),
        };
        viewport.pan(&anchor, 0.0, 1.0e7);
        assert_eq!(viewport.center().lat, 85.0);
        viewport.pan(&anchor, 0.0, -1.0e7);
        assert_eq!(viewport.center().lat, -85.0);
    }

    #[test]
    fn test_resize_and_reset() {
        let mut viewport = moscow();
        viewport.zoom_anchored(14.0, ScreenPoint::new(10.0, 20.0));
        viewport.resize(1024, 768);
        assert_eq!(viewport.zoom(), 14.0);
        assert_eq!((viewport.width(), viewport.height()), (1024, 768));

        viewport.reset();
        assert_eq!(viewport.zoom(), 11.0);
        assert_eq!(viewport.center(), GeoPoint::new(55.7558, 37.6173));
        assert_eq!(viewport.geo_to_screen(viewport.center()), ScreenPoint::new(512.0, 384.0));
    }

    #[test]
    fn test_visible_tiles_cover_viewport_with_margin() {
        let viewport = moscow();
        let tiles = viewport.visible_tiles();
        assert!(tiles.iter().all(|t| t.z == 11));

        let center_tile = {
            let (tx, ty) = geo_to_tile(viewport.center(), 11.0);
            TileAddress::new(11, tx.floor() as i32, ty.floor() as i32)
        };
        assert!(tiles.contains(&center_tile));

        // Every corner tile plus one extra ring
        let xs: Vec<i32> = tiles.iter().map(|t| t.x).collect();
        let ys: Vec<i32> = tiles.iter().map(|t| t.y).collect();
        let (min_x, max_x) = (*xs.iter().min().unwrap(), *xs.iter().max().unwrap());
        let (min_y, max_y) = (*ys.iter().min().unwrap(), *ys.iter().max().unwrap());

        let (left, _) = viewport.tile_screen_rect(&TileAddress::new(11, min_x + 1, min_y + 1));
        assert!(left.x <= 0.0 && left.y <= 0.0);
        let (right, size) = viewport.tile_screen_rect(&TileAddress::new(11, max_x - 1, max_y - 1));
        assert!(right.x + size >= 800.0 && right.y + size >= 600.0);
    }

    #[test]
    fn test_tile_screen_rect_scales_with_fractional_zoom() {
        let mut viewport = moscow();
        viewport.zoom_anchored(11.5, ScreenPoint::new(400.0, 300.0));
        let (_, size) = viewport.tile_screen_rect(&TileAddress::new(11, 1238, 640));
        assert_abs_diff_eq!(size, 256.0 * 2.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_edge_tiles_tolerated() {
        let config = MapConfig {
            default_center: GeoPoint::new(85.0, 179.99),
            ..MapConfig::default()
        };
        let viewport = Viewport::new(&config, 800, 600);
        let tiles = viewport.visible_tiles();
        assert!(tiles.iter().any(|t| !t.is_in_range()));
        for tile in &tiles {
            let (origin, size) = viewport.tile_screen_rect(tile);
            assert!(origin.x.is_finite() && origin.y.is_finite() && size > 0.0);
        }
    }
}
