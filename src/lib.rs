// Shukusho image resizing proxy library

pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod image_optimizer;
pub mod logging;
pub mod pipeline;
pub mod proxy;
pub mod router;
pub mod server;
