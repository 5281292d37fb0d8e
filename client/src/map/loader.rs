//! Asynchronous tile loader with platform-specific implementations

use std::collections::HashSet;

use super::cache::TileFetcher;
use super::config::MapConfig;
use super::projection::TileAddress;

/// Result of a tile load operation
#[derive(Debug)]
pub enum TileLoadResult {
    Success(TileAddress, Vec<u8>),
    Failed(TileAddress, String),
}

impl TileLoadResult {
    pub fn address(&self) -> TileAddress {
        match self {
            TileLoadResult::Success(address, _) | TileLoadResult::Failed(address, _) => *address,
        }
    }
}

/// Tile loading request
#[derive(Debug, Clone)]
struct TileRequest {
    address: TileAddress,
    url: String,
}

// Platform-specific channel types
#[cfg(not(target_arch = "wasm32"))]
type ResultReceiver = std::sync::mpsc::Receiver<TileLoadResult>;
#[cfg(not(target_arch = "wasm32"))]
type RequestSender = std::sync::mpsc::Sender<TileRequest>;

#[cfg(target_arch = "wasm32")]
use std::sync::{Arc, Mutex};

#[cfg(target_arch = "wasm32")]
type ResultReceiver = Arc<Mutex<Vec<TileLoadResult>>>;

/// Tile loader with async HTTP fetching.
///
/// Loads are fire-and-forget: there is no cancellation and no timeout.
pub struct TileLoader {
    result_rx: ResultReceiver,
    #[cfg(not(target_arch = "wasm32"))]
    request_tx: RequestSender,
    /// Failures decided locally, without a network round trip
    rejected: Vec<TileLoadResult>,
    pending: HashSet<TileAddress>,
    url_template: String,
    subdomains: Vec<String>,
    #[cfg(target_arch = "wasm32")]
    user_agent: String,
    #[cfg(not(target_arch = "wasm32"))]
    _worker_handle: Option<std::thread::JoinHandle<()>>,
}

impl TileLoader {
    /// Create a loader fetching over HTTP
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(config: &MapConfig) -> Self {
        let user_agent = config.user_agent.clone();
        Self::with_fetch(config, move || http_fetch(user_agent))
    }

    /// Create a loader whose worker fetches with the function built by
    /// `make_fetch` on the worker thread
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_fetch<M, F>(config: &MapConfig, make_fetch: M) -> Self
    where
        M: FnOnce() -> F + Send + 'static,
        F: FnMut(&str) -> Result<Vec<u8>, String>,
    {
        let (request_tx, request_rx) = std::sync::mpsc::channel::<TileRequest>();
        let (result_tx, result_rx) = std::sync::mpsc::channel::<TileLoadResult>();

        let worker = std::thread::spawn(move || {
            Self::worker_thread(request_rx, result_tx, make_fetch());
        });

        Self {
            result_rx,
            request_tx,
            rejected: Vec::new(),
            pending: HashSet::new(),
            url_template: config.tile_url_template.clone(),
            subdomains: config.tile_subdomains.clone(),
            _worker_handle: Some(worker),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(config: &MapConfig) -> Self {
        Self {
            result_rx: Arc::new(Mutex::new(Vec::new())),
            rejected: Vec::new(),
            pending: HashSet::new(),
            url_template: config.tile_url_template.clone(),
            subdomains: config.tile_subdomains.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Request a tile to be loaded
    pub fn request(&mut self, address: TileAddress) {
        if self.pending.contains(&address) {
            return; // Already loading
        }

        if !address.is_in_range() {
            self.pending.insert(address);
            self.rejected.push(TileLoadResult::Failed(
                address,
                "tile address outside the map".to_string(),
            ));
            return;
        }

        let url = address.to_url(&self.url_template, &self.subdomains);
        log::debug!("Requesting tile {}", url);
        let request = TileRequest { address, url };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.request_tx.send(request) {
                Ok(()) => {
                    self.pending.insert(address);
                }
                Err(_) => {
                    self.pending.insert(address);
                    self.rejected.push(TileLoadResult::Failed(
                        address,
                        "tile worker stopped".to_string(),
                    ));
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            self.pending.insert(address);
            self.spawn_wasm_fetch(request);
        }
    }

    /// Poll for completed tile loads
    pub fn poll(&mut self) -> Option<TileLoadResult> {
        let result = self.rejected.pop().or_else(|| self.next_fetched())?;
        self.pending.remove(&result.address());
        Some(result)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn next_fetched(&mut self) -> Option<TileLoadResult> {
        self.result_rx.try_recv().ok()
    }

    #[cfg(target_arch = "wasm32")]
    fn next_fetched(&mut self) -> Option<TileLoadResult> {
        self.result_rx.lock().ok()?.pop()
    }

    /// Check if a tile is currently being loaded
    pub fn is_loading(&self, address: &TileAddress) -> bool {
        self.pending.contains(address)
    }

    /// Get number of pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // Native implementation
    #[cfg(not(target_arch = "wasm32"))]
    fn worker_thread(
        request_rx: std::sync::mpsc::Receiver<TileRequest>,
        result_tx: std::sync::mpsc::Sender<TileLoadResult>,
        mut fetch: impl FnMut(&str) -> Result<Vec<u8>, String>,
    ) {
        while let Ok(request) = request_rx.recv() {
            let result = match fetch(&request.url) {
                Ok(bytes) => TileLoadResult::Success(request.address, bytes),
                Err(e) => TileLoadResult::Failed(request.address, e),
            };

            if result_tx.send(result).is_err() {
                break; // Receiver dropped, exit thread
            }
        }
    }

    // WASM implementation using web-sys fetch API
    #[cfg(target_arch = "wasm32")]
    fn spawn_wasm_fetch(&self, request: TileRequest) {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;
        use web_sys::{Request, RequestInit, RequestMode, Response};

        let result_buffer = self.result_rx.clone();
        let user_agent = self.user_agent.clone();

        wasm_bindgen_futures::spawn_local(async move {
            let result = async {
                let opts = RequestInit::new();
                opts.set_method("GET");
                opts.set_mode(RequestMode::Cors);

                let web_request = Request::new_with_str_and_init(&request.url, &opts)
                    .map_err(|e| format!("Failed to create request: {:?}", e))?;

                // Browsers may refuse to override User-Agent; that is not an error
                let _ = web_request.headers().set("User-Agent", &user_agent);

                let window = web_sys::window().ok_or("No window object")?;
                let resp_value = JsFuture::from(window.fetch_with_request(&web_request))
                    .await
                    .map_err(|e| format!("Fetch failed: {:?}", e))?;

                let resp: Response = resp_value
                    .dyn_into()
                    .map_err(|_| "Response is not a Response object")?;

                if !resp.ok() {
                    return Err(format!("HTTP {}", resp.status()));
                }

                let array_buffer = JsFuture::from(
                    resp.array_buffer()
                        .map_err(|e| format!("Failed to get array buffer: {:?}", e))?,
                )
                .await
                .map_err(|e| format!("Failed to read array buffer: {:?}", e))?;

                Ok(js_sys::Uint8Array::new(&array_buffer).to_vec())
            }
            .await;

            let tile_result = match result {
                Ok(bytes) => TileLoadResult::Success(request.address, bytes),
                Err(err) => TileLoadResult::Failed(request.address, err),
            };

            if let Ok(mut results) = result_buffer.lock() {
                results.push(tile_result);
            }
        });
    }
}

/// Blocking HTTP GET; a client that fails to build fails every request
#[cfg(not(target_arch = "wasm32"))]
fn http_fetch(user_agent: String) -> impl FnMut(&str) -> Result<Vec<u8>, String> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| e.to_string());
    if let Err(e) = &client {
        log::error!("Failed to create HTTP client: {}", e);
    }

    move |url| {
        let client = client.as_ref().map_err(Clone::clone)?;
        let response = client.get(url).send().map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        response.bytes().map(|bytes| bytes.to_vec()).map_err(|e| e.to_string())
    }
}

impl TileFetcher for TileLoader {
    fn fetch(&mut self, address: TileAddress) {
        self.request(address);
    }
}
