//! Per-frame scene: tiles, lines and station markers in screen space

use egui::Color32;

use super::cache::TileCache;
use super::hit_test::Selection;
use super::network::TransitNetwork;
use super::projection::{ScreenPoint, TileAddress};
use super::viewport::Viewport;

/// Markers this far outside the viewport are still emitted so labels and
/// strokes do not pop at the edges
const MARKER_MARGIN_PX: f64 = 50.0;

const FALLBACK_COLOR: Color32 = Color32::from_rgb(0x88, 0x88, 0x88);

/// A loaded tile to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileQuad {
    pub address: TileAddress,
    pub origin: ScreenPoint,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<ScreenPoint>,
    pub color: Color32,
    pub width: f32,
}

/// One filled circle of a station marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    pub radius: f32,
    pub color: Color32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationMarker {
    /// Index into the network's stations
    pub station: usize,
    pub position: ScreenPoint,
    /// Drawn in order, outermost first
    pub rings: Vec<Ring>,
    pub stroke_width: f32,
    pub highlighted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub tiles: Vec<TileQuad>,
    pub lines: Vec<Polyline>,
    pub stations: Vec<StationMarker>,
    pub highlighted: Option<usize>,
}

impl Scene {
    pub fn build<T>(
        viewport: &Viewport,
        visible: &[TileAddress],
        cache: &TileCache<T>,
        network: &TransitNetwork,
        selection: &Selection,
    ) -> Self {
        let k = (viewport.zoom() / 11.0) as f32;

        let tiles = visible
            .iter()
            .filter(|address| cache.peek(address).is_some())
            .map(|address| {
                let (origin, size) = viewport.tile_screen_rect(address);
                TileQuad {
                    address: *address,
                    origin,
                    size,
                }
            })
            .collect();

        let line_width = (4.0 * k).max(3.0);
        let lines = network
            .lines
            .iter()
            .map(|line| Polyline {
                points: line.points.iter().map(|p| viewport.geo_to_screen(*p)).collect(),
                color: parse_hex_color(&line.color),
                width: line_width,
            })
            .collect();

        let highlighted = selection.highlighted();
        let base_radius = (8.0 * k).max(5.0);
        let (w, h) = (viewport.width() as f64, viewport.height() as f64);

        let mut stations = Vec::new();
        for (index, station) in network.stations.iter().enumerate() {
            let position = viewport.geo_to_screen(station.position);
            if position.x < -MARKER_MARGIN_PX
                || position.y < -MARKER_MARGIN_PX
                || position.x > w + MARKER_MARGIN_PX
                || position.y > h + MARKER_MARGIN_PX
            {
                continue;
            }

            let is_highlighted = highlighted == Some(index);
            let (rings, stroke_width) = if station.is_transfer() {
                let radius = if is_highlighted { base_radius * 1.3 } else { base_radius };
                let rings = station
                    .line_colors
                    .iter()
                    .enumerate()
                    .map(|(i, color)| Ring {
                        radius: (radius - i as f32 * 2.5 * k).max(2.0),
                        color: parse_hex_color(color),
                    })
                    .collect();
                (rings, (1.5 * k).max(1.0))
            } else {
                let radius = if is_highlighted { base_radius * 1.2 } else { base_radius };
                let ring = Ring {
                    radius,
                    color: parse_hex_color(station.color()),
                };
                (vec![ring], (2.0 * k).max(1.5))
            };

            stations.push(StationMarker {
                station: index,
                position,
                rings,
                stroke_width,
                highlighted: is_highlighted,
            });
        }

        Self {
            tiles,
            lines,
            stations,
            highlighted,
        }
    }
}

/// Parse `#rgb` or `#rrggbb`; anything else is grey
pub fn parse_hex_color(text: &str) -> Color32 {
    let Some(hex) = text.trim().strip_prefix('#') else {
        return FALLBACK_COLOR;
    };
    if !hex.is_ascii() {
        return FALLBACK_COLOR;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let rgb = match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            (expand(0), expand(1), expand(2))
        }
        6 => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6])),
        _ => return FALLBACK_COLOR,
    };
    match rgb {
        (Some(r), Some(g), Some(b)) => Color32::from_rgb(r, g, b),
        _ => FALLBACK_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::cache::TileFetcher;
    use crate::map::config::MapConfig;
    use crate::map::network::{LineGeometry, Station};
    use crate::map::projection::GeoPoint;

    struct NoopFetcher;

    impl TileFetcher for NoopFetcher {
        fn fetch(&mut self, _address: TileAddress) {}
    }

    fn station(name: &str, position: GeoPoint, colors: &[&str]) -> Station {
        Station {
            name: name.to_string(),
            name_en: name.to_string(),
            position,
            lines: (1..=colors.len()).map(|i| i.to_string()).collect(),
            line_colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn network(viewport: &Viewport) -> TransitNetwork {
        TransitNetwork {
            stations: vec![
                station("center", viewport.center(), &["#EF161E"]),
                station("transfer", viewport.screen_to_geo(ScreenPoint::new(100.0, 100.0)), &["#0078BE", "#894E35"]),
                station("far away", GeoPoint::new(59.93, 30.31), &["#EF161E"]),
            ],
            lines: vec![LineGeometry {
                color: "#2DBE2C".to_string(),
                points: vec![viewport.center(), viewport.screen_to_geo(ScreenPoint::new(0.0, 0.0))],
            }],
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#EF161E"), Color32::from_rgb(0xEF, 0x16, 0x1E));
        assert_eq!(parse_hex_color("#fff"), Color32::from_rgb(255, 255, 255));
        assert_eq!(parse_hex_color("red"), FALLBACK_COLOR);
        assert_eq!(parse_hex_color("#12345"), FALLBACK_COLOR);
        assert_eq!(parse_hex_color("#ЖЖЖ"), FALLBACK_COLOR);
    }

    #[test]
    fn test_only_loaded_tiles_are_drawn() {
        let viewport = Viewport::new(&MapConfig::default(), 800, 600);
        let visible = viewport.visible_tiles();
        let mut cache: TileCache<()> = TileCache::default();
        for address in &visible {
            cache.request(*address, &mut NoopFetcher);
        }
        cache.complete(visible[0], Ok(()));
        cache.complete(visible[1], Err("HTTP 500".to_string()));

        let scene = Scene::build(&viewport, &visible, &cache, &TransitNetwork::default(), &Selection::default());
        assert_eq!(scene.tiles.len(), 1);
        assert_eq!(scene.tiles[0].address, visible[0]);
        assert_eq!(scene.tiles[0].size, 256.0);
        assert!(scene.stations.is_empty());
    }

    #[test]
    fn test_station_markers() {
        let viewport = Viewport::new(&MapConfig::default(), 800, 600);
        let network = network(&viewport);
        let mut selection = Selection::default();
        selection.tap(Some(1));

        let cache: TileCache<()> = TileCache::default();
        let scene = Scene::build(&viewport, &[], &cache, &network, &selection);

        // The far away station is culled
        assert_eq!(scene.stations.len(), 2);
        assert_eq!(scene.highlighted, Some(1));

        let plain = &scene.stations[0];
        assert_eq!(plain.position, ScreenPoint::new(400.0, 300.0));
        assert_eq!(plain.rings, vec![Ring { radius: 8.0, color: Color32::from_rgb(0xEF, 0x16, 0x1E) }]);
        assert_eq!(plain.stroke_width, 2.0);
        assert!(!plain.highlighted);

        let transfer = &scene.stations[1];
        assert!(transfer.highlighted);
        assert_eq!(transfer.rings.len(), 2);
        assert!((transfer.rings[0].radius - 8.0 * 1.3).abs() < 1e-5);
        assert!((transfer.rings[1].radius - (8.0 * 1.3 - 2.5)).abs() < 1e-5);
        assert!(transfer.rings[0].radius > transfer.rings[1].radius);
        assert_eq!(transfer.stroke_width, 1.5);

        assert_eq!(scene.lines.len(), 1);
        assert_eq!(scene.lines[0].width, 4.0);
        assert_eq!(scene.lines[0].points[0], ScreenPoint::new(400.0, 300.0));
    }

    #[test]
    fn test_style_scales_with_zoom() {
        let config = MapConfig::default();
        let mut viewport = Viewport::new(&config, 800, 600);
        viewport.zoom_by(-2.0);
        viewport.zoom_by(-2.0);
        assert_eq!(viewport.zoom(), 9.0);

        let network = network(&viewport);
        let cache: TileCache<()> = TileCache::default();
        let scene = Scene::build(&viewport, &[], &cache, &network, &Selection::default());

        let k = (9.0_f64 / 11.0) as f32;
        assert_eq!(scene.lines[0].width, 4.0 * k);
        assert_eq!(scene.stations[0].rings[0].radius, 8.0 * k);
        assert!(scene.stations[0].rings[0].radius < 8.0);
    }
}
