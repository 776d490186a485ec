//! Blossom Core - Shared types library.
//!
//! This crate provides the domain types shared by every Blossom component:
//! - `commerce` - the client-side commerce state core (session, cart, favorites, checkout)
//! - the presentation layer embedding it
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
