//! Registry terminal user interface
//!
//! A main menu leads to one list/edit screen per entity. Screens implement
//! [`traits::Screen`] and the [`App`] routes keys, ticks and navigation.

pub mod app;
pub mod components;
pub mod screens;
pub mod traits;
pub mod ui;

pub use app::App;
pub use traits::{Screen, ScreenAction, ScreenId};
