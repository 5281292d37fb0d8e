//! Web Mercator (EPSG:3857) projection between geographic, world-pixel and tile space
//!
//! Every other module goes through these functions; the trigonometric
//! formulas live here and nowhere else.

use std::f64::consts::PI;
use std::fmt;

use serde::Deserialize;

/// Tile size in pixels (standard OSM tile size)
pub const TILE_SIZE: f64 = 256.0;

/// Latitude where the Mercator square ends
pub const MERCATOR_MAX_LAT: f64 = 85.05112878;

/// Highest integer zoom a tile address can carry
const MAX_TILE_ZOOM: f64 = 30.0;

/// Geographic position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Pixel position relative to the viewport's top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Pixel position on the whole-world bitmap at some zoom
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Address of a raster tile.
///
/// `x` and `y` are signed because the visible range at the map edges can
/// step outside `[0, 2^z)`; such addresses are valid keys that simply never
/// resolve to an image.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileAddress {
    pub z: u8,
    pub x: i32,
    pub y: i32,
}

impl TileAddress {
    pub fn new(z: u8, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles per side at this zoom level
    pub fn tiles_per_side(&self) -> i64 {
        1_i64 << self.z.min(MAX_TILE_ZOOM as u8)
    }

    /// Whether the address names a tile that exists on the tile server
    pub fn is_in_range(&self) -> bool {
        let n = self.tiles_per_side();
        (0..n).contains(&(self.x as i64)) && (0..n).contains(&(self.y as i64))
    }

    /// Build the tile URL, picking a mirror by `(x + y) mod N`
    pub fn to_url(&self, template: &str, subdomains: &[String]) -> String {
        let subdomain = if subdomains.is_empty() {
            ""
        } else {
            let idx = (self.x as i64 + self.y as i64).rem_euclid(subdomains.len() as i64);
            subdomains[idx as usize].as_str()
        };
        template
            .replace("{s}", subdomain)
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Scale factor of the tile grid at a (possibly fractional) zoom
fn world_scale(zoom: f64) -> f64 {
    2.0_f64.powf(zoom)
}

/// Convert a geographic point to fractional tile coordinates
pub fn geo_to_tile(p: GeoPoint, zoom: f64) -> (f64, f64) {
    let n = world_scale(zoom);

    let x = (p.lon + 180.0) / 360.0 * n;

    let lat_rad = clamp_latitude(p.lat, MERCATOR_MAX_LAT).to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

    (x, y)
}

/// Convert fractional tile coordinates back to a geographic point
pub fn tile_to_geo(tx: f64, ty: f64, zoom: f64) -> GeoPoint {
    let n = world_scale(zoom);

    let lon = tx / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * ty / n)).sinh().atan();

    GeoPoint::new(lat_rad.to_degrees(), lon)
}

pub fn geo_to_world_pixel(p: GeoPoint, zoom: f64) -> WorldPoint {
    let (tx, ty) = geo_to_tile(p, zoom);
    WorldPoint::new(tx * TILE_SIZE, ty * TILE_SIZE)
}

pub fn world_pixel_to_geo(w: WorldPoint, zoom: f64) -> GeoPoint {
    tile_to_geo(w.x / TILE_SIZE, w.y / TILE_SIZE, zoom)
}

/// World-pixel position of a tile's top-left corner at a fractional zoom
pub fn tile_origin_world_pixel(tile: &TileAddress, zoom: f64) -> WorldPoint {
    let scale = world_scale(zoom - tile.z as f64);
    WorldPoint::new(
        tile.x as f64 * TILE_SIZE * scale,
        tile.y as f64 * TILE_SIZE * scale,
    )
}

/// Integer zoom level used for tile addressing
pub fn tile_zoom(zoom: f64) -> u8 {
    if zoom.is_nan() {
        return 0;
    }
    zoom.floor().clamp(0.0, MAX_TILE_ZOOM) as u8
}

/// Normalize longitude to [-180, 180]
pub fn normalize_longitude(lon: f64) -> f64 {
    if !lon.is_finite() {
        return 0.0;
    }
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Clamp latitude to `[-limit, limit]`; NaN collapses to the equator
pub fn clamp_latitude(lat: f64, limit: f64) -> f64 {
    if lat.is_nan() {
        return 0.0;
    }
    lat.clamp(-limit, limit)
}
