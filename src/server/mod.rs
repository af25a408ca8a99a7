pub mod config;
mod http_layers;
pub mod server;
pub(self) mod source_auth;
pub mod state;
pub(self) mod stream_sample;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::make_app;
#[allow(unused_imports)] // Used by main.rs
pub use server::run_server;
pub use source_auth::{SourceDirectory, UploadSource};
