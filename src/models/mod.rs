pub mod config;
pub mod file_system;
pub mod metadata;
pub mod package;

pub use config::*;
pub use file_system::*;
pub use metadata::*;
pub use package::*;
