pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod rdm;
pub mod roles;
pub mod stats;
pub mod summary;
pub mod table;
pub mod trials;

pub use config::Config;
pub use error::Error;
