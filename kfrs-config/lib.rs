pub use self::cli::Args;
pub use self::config::{APP_NAME, APP_VERSION, Config};

pub mod cli;
pub mod config;
