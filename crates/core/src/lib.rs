pub mod config;
pub mod error;
pub mod notification;
pub mod registry;

pub use config::Config;
pub use error::*;
pub use notification::*;
pub use registry::*;
