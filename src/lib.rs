pub mod bloom;
pub mod cli;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod position;
pub mod resolver;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{ResolveError, StoreError};
pub use resolver::{QuerySession, ResolveRequest, ResolvedPage, Resolver, Stores};
