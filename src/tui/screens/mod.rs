//! Screen modules for the registry TUI

pub mod entity;
pub mod help;
pub mod main_menu;

pub use entity::EntityScreen;
pub use help::HelpScreen;
pub use main_menu::MainMenuScreen;
