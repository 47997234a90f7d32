pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod ime;
pub mod pipeline;

pub use app::run;
pub use error::{BotError, BotResult};
