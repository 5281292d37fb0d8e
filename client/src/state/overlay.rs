//! egui painting of the vector layers and map panels

use egui::{Align2, Color32, Context, FontId, Painter, Pos2, Shape, Stroke, TopBottomPanel};

use crate::map::MapSystem;
use crate::map::network::Station;
use crate::map::projection::ScreenPoint;
use crate::map::scene::Scene;

const LABEL_OFFSET: f32 = 12.0;

/// Map pixels to egui points
fn to_pos(p: ScreenPoint, points_per_pixel: f32) -> Pos2 {
    Pos2::new(p.x as f32 * points_per_pixel, p.y as f32 * points_per_pixel)
}

/// Lines under stations, stations in dataset order
pub fn paint_scene(painter: &Painter, scene: &Scene, stations: &[Station], points_per_pixel: f32) {
    let scale = points_per_pixel;

    for line in &scene.lines {
        let points = line.points.iter().map(|p| to_pos(*p, scale)).collect();
        painter.add(Shape::line(points, Stroke::new(line.width * scale, line.color)));
    }

    for marker in &scene.stations {
        let center = to_pos(marker.position, scale);
        for (i, ring) in marker.rings.iter().enumerate() {
            // Only the outer ring carries the white outline
            let stroke = if i == 0 {
                Stroke::new(marker.stroke_width * scale, Color32::WHITE)
            } else {
                Stroke::NONE
            };
            painter.circle(center, ring.radius * scale, ring.color, stroke);
        }
        if let (true, Some(outer)) = (marker.highlighted, marker.rings.first()) {
            painter.circle_stroke(center, outer.radius * scale + 2.0, Stroke::new(1.5, Color32::BLACK));
        }
    }

    let Some(highlighted) = scene.highlighted else {
        return;
    };
    let (Some(marker), Some(station)) = (
        scene.stations.iter().find(|m| m.station == highlighted),
        stations.get(highlighted),
    ) else {
        return;
    };
    let anchor = to_pos(marker.position, scale) + egui::vec2(LABEL_OFFSET, -LABEL_OFFSET);
    let text = format!("{} ({})", station.name, station.name_en);
    let font = FontId::proportional(14.0);
    let galley = painter.layout_no_wrap(text.clone(), font.clone(), Color32::BLACK);
    let rect = Align2::LEFT_BOTTOM
        .anchor_size(anchor, galley.size())
        .expand(3.0);
    painter.rect_filled(rect, 3.0, Color32::from_white_alpha(220));
    painter.text(anchor, Align2::LEFT_BOTTOM, text, font, Color32::BLACK);
}

pub fn status_panel(ctx: &Context, map: &MapSystem) {
    let stats = map.cache_stats();
    TopBottomPanel::bottom("status").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(format!("Stations: {}", map.network().stations.len()));
            ui.separator();
            ui.label(format!("Zoom: {:.2}", map.zoom_level()));
            ui.separator();
            let capacity = match stats.capacity {
                Some(capacity) => format!(" (max {})", capacity),
                None => String::new(),
            };
            ui.label(format!(
                "Tiles: {} loaded{}, {} pending, {} failed",
                stats.loaded, capacity, stats.pending, stats.failed
            ));
            ui.separator();
            ui.label("Drag to pan, scroll or pinch to zoom, R to reset");
        });
    });
}

/// Details of the hovered or selected station
pub fn info_panel(ctx: &Context, station: Option<&Station>) {
    let Some(station) = station else {
        return;
    };
    egui::Window::new("Station")
        .anchor(Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.heading(station.name.as_str());
            if station.name_en != station.name {
                ui.label(station.name_en.as_str());
            }
            ui.separator();
            ui.label(format!("Lines: {}", station.lines_label()));
            ui.label(format!(
                "{:.6}, {:.6}",
                station.position.lat, station.position.lon
            ));
        });
}
