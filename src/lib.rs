//! A desktop system-tray core.
//!
//! Items describe what a tray entry shows through queries and change
//! events. A [`Tray`] lays their icons out in named boxes, tracks the
//! configuration for separators and the menu icon's side, and owns the
//! visual tree the iced front end renders.

pub mod config;
pub mod error;
pub mod host;
pub mod icon;
pub mod icon_theme;
pub mod image;
pub mod item;
pub mod menu;
pub mod signal;
pub mod theme;
pub mod tray;
pub mod view;
pub mod widget;

pub use config::{Config, IconConfig, Separators, Side, TrayConfig};
pub use error::{Result, TrayError};
pub use icon::Icon;
pub use icon_theme::IconTheme;
pub use item::{Item, ItemEvent, ItemWrapper};
pub use tray::Tray;
pub use widget::Node;
