pub mod config;
pub mod driver;
pub mod error;
pub mod ini;
pub mod plot;
pub mod sweep;
pub mod tool;
pub mod util;
