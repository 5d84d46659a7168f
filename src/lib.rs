//! Flam R&D native bridge
//!
//! Native image-processing entry points for the Android app:
//! - Opaque handles for native image buffers
//! - Grayscale + Canny edges and grayscale + blur, in place
//! - Camera YUV planes to RGBA
//! - Row-by-row marshalling between Java byte arrays and strided buffers
//!
//! The pixel work itself is delegated to a [`backend::VisionBackend`].

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handle_registry;
pub mod image_engine;
mod jni_bridge;
pub mod yuv_engine;

pub use bridge::NativeBridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use image_engine::{ImageBuffer, PixelFormat};

use std::sync::OnceLock;

use android_logger::Config;

static LOG_TAG: OnceLock<String> = OnceLock::new();

/// Initialize the native library logger
///
/// The tag only takes effect on the first call; later calls adjust the level.
pub fn init_library(config: &BridgeConfig) {
    let level = config.max_level().unwrap_or(log::LevelFilter::Debug);
    LOG_TAG.get_or_init(|| {
        android_logger::init_once(
            Config::default()
                .with_max_level(level)
                .with_tag(config.log_tag.as_str()),
        );
        config.log_tag.clone()
    });
    log::set_max_level(level);
    log::info!("native bridge {} initialized", VERSION);
}

/// Tag the logger was initialized with, if it has been
pub(crate) fn active_log_tag() -> Option<&'static str> {
    LOG_TAG.get().map(String::as_str)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
