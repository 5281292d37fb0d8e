pub mod app;
pub mod map;
pub mod state;

use winit::event_loop::EventLoop;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::app::App;
use crate::map::config::MapConfig;
use crate::map::network::TransitNetwork;

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| anyhow::anyhow!("couldn't init logger: {}", e))?;
    }

    let map_config = MapConfig::from_env();
    let network = TransitNetwork::from_env();

    let event_loop = EventLoop::with_user_event().build()?;
    #[cfg(not(target_arch = "wasm32"))]
    let mut app = App::new(map_config, network);
    #[cfg(target_arch = "wasm32")]
    let mut app = App::new(&event_loop, map_config, network);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
