//! Proxy module - chat relay server

pub mod chat;
pub mod error;
pub mod handlers;
pub mod nonce;
pub mod rate_limit;
pub mod server;
pub mod token_cache;

pub use chat::ChatProxy;
pub use error::ProxyError;
pub use nonce::NonceFetcher;
pub use server::ProxyServer;
pub use token_cache::{CacheStats, Token, TokenCache};
