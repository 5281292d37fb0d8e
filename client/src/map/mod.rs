//! Transit map system: projection, viewport, tiles, gestures and hit testing

pub mod cache;
pub mod config;
pub mod gesture;
pub mod loader;
pub mod network;
pub mod projection;
pub mod renderer;
pub mod scene;
pub mod viewport;

use cache::{CacheStats, TileCache};
use config::MapConfig;
use gesture::{GestureConfig, GestureController, InputEvent, Interaction};
use hit_test::{find_nearest, Selection};
use loader::{TileLoadResult, TileLoader};
use network::{Station, TransitNetwork};
use projection::ScreenPoint;
use renderer::{CachedTile, TileRenderer};
use scene::Scene;
use viewport::Viewport;

/// Integrated map system
pub struct MapSystem {
    pub viewport: Viewport,
    config: MapConfig,
    tile_cache: TileCache<CachedTile>,
    tile_loader: TileLoader,
    tile_renderer: TileRenderer,
    gestures: GestureController,
    selection: Selection,
    /// Last mouse position over the map, re-tested every frame
    hover_at: Option<ScreenPoint>,
    network: TransitNetwork,

    /// Scene for this frame (built in update)
    scene: Scene,
}

impl MapSystem {
    pub fn new(
        device: &wgpu::Device,
        texture_format: wgpu::TextureFormat,
        viewport_width: u32,
        viewport_height: u32,
        config: MapConfig,
        network: TransitNetwork,
    ) -> Self {
        let viewport = Viewport::new(&config, viewport_width, viewport_height);
        let tile_cache = TileCache::new(config.tile_cache_capacity);
        let tile_loader = TileLoader::new(&config);
        let tile_renderer = TileRenderer::new(device, texture_format);
        let gestures = GestureController::new(GestureConfig::from(&config));

        Self {
            viewport,
            config,
            tile_cache,
            tile_loader,
            tile_renderer,
            gestures,
            selection: Selection::default(),
            hover_at: None,
            network,
            scene: Scene::default(),
        }
    }

    /// Update the map system (call each frame)
    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        // 1. Process completed loads
        while let Some(result) = self.tile_loader.poll() {
            match result {
                TileLoadResult::Success(address, data) => {
                    let decoded = self
                        .tile_renderer
                        .create_cached_tile(device, queue, &data)
                        .map_err(|e| format!("decode failed: {}", e));
                    self.tile_cache.complete(address, decoded);
                }
                TileLoadResult::Failed(address, err) => {
                    self.tile_cache.complete(address, Err(err));
                }
            }
        }

        // 2. Request every visible tile; the cache issues each load once
        let visible = self.viewport.visible_tiles();
        for address in &visible {
            self.tile_cache.request(*address, &mut self.tile_loader);
        }

        // 3. The map may have moved under a still cursor
        self.refresh_hover();

        // 4. Build the frame from whatever is available now
        self.scene = Scene::build(
            &self.viewport,
            &visible,
            &self.tile_cache,
            &self.network,
            &self.selection,
        );
        self.tile_renderer.prepare(
            device,
            queue,
            &self.scene.tiles,
            &self.tile_cache,
            self.viewport.width(),
            self.viewport.height(),
        );
    }

    /// Render the tile layer
    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        self.tile_renderer.render(render_pass, &self.tile_cache);
    }

    /// Feed one input event through the gesture state machine
    pub fn handle_input(&mut self, event: &InputEvent) {
        let Some(interaction) = self.gestures.handle(event, &mut self.viewport) else {
            return;
        };
        match interaction {
            Interaction::Hover(at) => {
                self.hover_at = Some(at);
                self.refresh_hover();
            }
            Interaction::Tap(at) => {
                let hit = find_nearest(
                    &self.viewport,
                    &self.network.stations,
                    at,
                    self.config.tap_radius_px,
                );
                if let Some(index) = hit {
                    log::debug!("Tapped station {}", self.network.stations[index].name);
                }
                self.selection.tap(hit);
            }
        }
    }

    fn refresh_hover(&mut self) {
        let hit = self.hover_at.and_then(|at| {
            find_nearest(&self.viewport, &self.network.stations, at, self.config.hover_radius_px)
        });
        self.selection.hover(hit);
    }

    /// Handle viewport resize
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
    }

    /// Pointer left the map: nothing is hovered any more
    pub fn clear_hover(&mut self) {
        self.hover_at = None;
        self.selection.hover(None);
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn network(&self) -> &TransitNetwork {
        &self.network
    }

    /// Station shown in the info panel
    pub fn highlighted_station(&self) -> Option<&Station> {
        self.selection
            .highlighted()
            .and_then(|index| self.network.stations.get(index))
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.tile_cache.stats()
    }

    pub fn zoom_level(&self) -> f64 {
        self.viewport.zoom()
    }
}
