//! `jstd-server`: HTTP front end for the shared test-case cache.
//!
//! Runner clients upload test cases and file contents through `POST /fileSet`;
//! captured browsers ask the same endpoint what to fetch, then pull content
//! from `GET /test/<path>`. All state lives in one [`FileSetService`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod http;
pub mod protocol;

pub use config::ServerConfig;
pub use errors::{ConfigError, HandlerError, ServerError};
pub use handlers::FileSetService;
pub use http::FileSetServer;
