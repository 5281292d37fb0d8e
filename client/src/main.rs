#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    metromap::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
