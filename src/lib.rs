//! StoreLink: franchise ERP companion client.
//!
//! The crate splits into an authenticated request gateway (`client`), which
//! keeps a session alive across access-token rotation, and a push
//! registration manager (`push`), which drives the device token lifecycle
//! and topic subscriptions. Everything else supports those two.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod platform;
pub mod prefs;
pub mod push;
pub mod store;
pub mod ui;

#[cfg(test)]
pub mod tests;

pub use client::{ApiClient, HttpClient};
pub use error::{Result, StorelinkError};
