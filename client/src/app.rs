use crate::map::config::MapConfig;
use crate::map::network::TransitNetwork;
use crate::state::State;
use std::sync::Arc;
use log::error;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
#[allow(unused_imports)]
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

const WINDOW_TITLE: &str = "Metro map";

pub struct App {
    #[cfg(target_arch = "wasm32")]
    proxy: Option<winit::event_loop::EventLoopProxy<State>>,
    state: Option<State>,
    map_config: MapConfig,
    network: TransitNetwork,
}

impl App {
    pub fn new(
        #[cfg(target_arch = "wasm32")] event_loop: &EventLoop<State>,
        map_config: MapConfig,
        network: TransitNetwork,
    ) -> Self {
        #[cfg(target_arch = "wasm32")]
        let proxy = Some(event_loop.create_proxy());
        Self {
            #[cfg(target_arch = "wasm32")]
            proxy,
            state: None,
            map_config,
            network,
        }
    }
}

impl ApplicationHandler<State> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(WINDOW_TITLE);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Unable to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = State::new(window.clone(), self.map_config.clone(), self.network.clone());
            match pollster::block_on(state) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    error!("Unable to initialize graphics: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            // Run the future asynchronously and use the
            // proxy to send the results to the event loop
            if let Some(proxy) = self.proxy.take() {
                let map_config = self.map_config.clone();
                let network = self.network.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    match State::new(window, map_config, network).await {
                        Ok(state) => {
                            if proxy.send_event(state).is_err() {
                                error!("Event loop closed before the map was ready");
                            }
                        }
                        Err(e) => error!("Unable to create canvas: {:#}", e),
                    }
                });
            }
        }
    }

    #[allow(unused_mut)]
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, mut state: State) {
        #[cfg(target_arch = "wasm32")]
        {
            state.window.request_redraw();
            state.resize(
                state.window.inner_size().width,
                state.window.inner_size().height,
            );
        }
        self.state = Some(state);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _: WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(v) => v,
            None => return,
        };

        if state.handle_input(&event) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                state.resize(width, height);
            }
            WindowEvent::RedrawRequested => {
                state.update();
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.resize(state.config.width, state.config.height)
                    }
                    Err(e) => {
                        error!("render: {:?}", e);
                    }
                }
            },
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key_code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::KeyR => {
                    log::info!("View reset");
                    state.map.reset_view();
                }
                _ => {}
            },
            _ => {}
        }
    }
}
