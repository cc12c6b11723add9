//! HTTP handlers

pub mod chat;
