//! # tagcast
//!
//! Wiring for the `tagcast-site` and `tagcast-watch` binaries.
//!
//! - [`app::site_router`]: bootstrap route, demo admin routes, `/metrics`
//! - [`admin`]: in-memory admin store and its invalidating write handlers

#![deny(unsafe_code)]

pub mod admin;
pub mod app;
