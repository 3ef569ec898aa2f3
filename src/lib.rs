//! bookmark-sync: a personal bookmark list kept live across sessions.
//!
//! The core is [`managers::BookmarkSynchronizer`], which reconciles one user's
//! bookmark list against a [`store::RemoteStore`]. This library crate exposes
//! all modules for use by the RPC binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod store;
pub mod types;
pub mod views;
