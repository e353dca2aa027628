//! Board Game Forum - discussions and a marketplace for board games
//!
//! This library provides the core functionality of the forum: storage,
//! business rules, page rendering and the HTTP routes.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
