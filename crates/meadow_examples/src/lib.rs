#![forbid(unsafe_code)]

mod config;
mod rendering;

pub use config::{load_meadow_config, MeadowConfig};
pub use rendering::{init_tracing, render_meadow_to_png, RenderConfig};
