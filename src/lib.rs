//! Civic Registry
//!
//! Paginated CRUD over the records of a municipal social-assistance registry,
//! served from a local SQLite database or a remote REST API.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod crud;
pub mod errors;
pub mod lookup;
pub mod models;
pub mod remote;
pub mod storage;
pub mod tui;
