pub mod checkpoint;
pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod logging;
pub mod package;
pub mod version;
