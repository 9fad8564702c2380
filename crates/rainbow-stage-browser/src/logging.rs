//! Console logging for the stage.

use tracing::Level;
use tracing::subscriber::set_global_default;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

/// Route `tracing` output to the browser console and install the panic hook.
///
/// Safe to call more than once; later calls leave the first subscriber.
pub fn init_logging() {
    console_error_panic_hook::set_once();

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    let reg = Registry::default().with(wasm_layer);
    if set_global_default(reg).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
