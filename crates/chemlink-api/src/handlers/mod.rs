//! HTTP handlers for chemlink-api.

pub mod chemistry;
pub mod health;
