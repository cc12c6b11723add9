//! Relaychat Core Library
//! Shared logic for nonce acquisition, token caching, and chat relay

pub mod config;
pub mod proxy;
