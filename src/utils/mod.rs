pub mod config;
pub mod logger;
pub mod prompt;
pub mod troilkatt_toml;

pub use config::*;
pub use logger::setup_logging;
pub use prompt::confirm;
pub use troilkatt_toml::{load_config, parse_config};
