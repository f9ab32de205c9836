#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod feed;
pub mod identity;
pub mod item;
pub mod model;
pub mod render;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use feed::Feed;
pub use model::{can_delete, Comment, Role, Viewer};
