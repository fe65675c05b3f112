//! Configuration: the on-disk file model, live reload, and the observable
//! `TrayConfig` / `IconConfig` objects a tray reacts to.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use iced::futures::{SinkExt, Stream};
use iced::stream;
use iced::Color;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::icon_theme::ICON_SIZE;
use crate::signal::{HandlerId, Signals};

/// Which side of the icon area something sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

/// Bitmask of the sides showing an outer separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Side>", into = "Vec<Side>")]
pub struct Separators(u8);

impl Separators {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, side: Side) -> bool {
        let bit = match side {
            Side::Left => Self::LEFT,
            Side::Right => Self::RIGHT,
        };
        self.0 & bit.0 != 0
    }
}

impl From<Vec<Side>> for Separators {
    fn from(sides: Vec<Side>) -> Self {
        sides.into_iter().fold(Self::NONE, |acc, side| match side {
            Side::Left => Self(acc.0 | Self::LEFT.0),
            Side::Right => Self(acc.0 | Self::RIGHT.0),
        })
    }
}

impl From<Separators> for Vec<Side> {
    fn from(separators: Separators) -> Self {
        [Side::Left, Side::Right]
            .into_iter()
            .filter(|side| separators.has(*side))
            .collect()
    }
}

// ============================================================================
// File model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tray: TrayOptions,
    #[serde(default)]
    pub icons: IconOptions,
    #[serde(default)]
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrayOptions {
    #[serde(default = "default_tray_name")]
    pub name: String,
    /// Sides showing an outer separator, e.g. `["left", "right"]`.
    #[serde(default)]
    pub separators: Separators,
    /// Side the menu icon sits on.
    #[serde(default)]
    pub menus: Side,
    /// strftime pattern for the clock item
    #[serde(default)]
    pub clock_format: Option<String>,
    /// Extra boxes created at startup, in visual order.
    #[serde(default)]
    pub boxes: Vec<BoxOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxOptions {
    pub id: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub separator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconOptions {
    #[serde(default = "default_icon_size")]
    pub size: u32,
    #[serde(default)]
    pub vertical: bool,
    /// Icon theme name (None = hicolor only)
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    // Font size in pixels (default: 14)
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    // Spacing between icons in pixels (default: 4)
    #[serde(default = "default_icon_spacing")]
    pub icon_spacing: f32,

    pub background: String,
    pub background_alpha: f32,
    pub text: String,
    pub accent: String,
    pub surface: String,
    pub border: String,
    pub muted: String,
    pub hover: String,
    pub hover_alpha: f32,
}

fn default_tray_name() -> String {
    "trayline".to_string()
}

fn default_icon_size() -> u32 {
    ICON_SIZE
}

fn default_font_size() -> f32 {
    14.0
}

fn default_icon_spacing() -> f32 {
    4.0
}

impl Default for TrayOptions {
    fn default() -> Self {
        Self {
            name: default_tray_name(),
            separators: Separators::NONE,
            menus: Side::Right,
            clock_format: None,
            boxes: Vec::new(),
        }
    }
}

impl Default for IconOptions {
    fn default() -> Self {
        Self {
            size: default_icon_size(),
            vertical: false,
            theme: None,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        // Tokyo Night color scheme
        Self {
            font_size: default_font_size(),
            icon_spacing: default_icon_spacing(),
            background: "#1a1b26".to_string(),
            background_alpha: 0.85,
            text: "#c0caf5".to_string(),
            accent: "#7aa2f7".to_string(),
            surface: "#24283b".to_string(),
            border: "#414868".to_string(),
            muted: "#565f89".to_string(),
            hover: "#414868".to_string(),
            hover_alpha: 0.5,
        }
    }
}

/// Get the config file path: $XDG_CONFIG_HOME/trayline/config.toml
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("trayline")
        .join("config.toml")
}

impl Config {
    /// Load config from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            info!(path = %path.display(), "wrote default config");
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Parse a hex color string (e.g., "#7aa2f7") to iced::Color
pub fn parse_hex_color(hex: &str) -> Color {
    parse_hex_color_with_alpha(hex, 1.0)
}

/// Parse a hex color string with alpha
pub fn parse_hex_color_with_alpha(hex: &str, alpha: f32) -> Color {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Color::WHITE; // Fallback
    }

    let Ok(rgb) = u32::from_str_radix(hex, 16) else {
        return Color::WHITE;
    };
    let [_, r, g, b] = rgb.to_be_bytes();
    Color::from_rgba8(r, g, b, alpha)
}

// ============================================================================
// Live reload
// ============================================================================

#[derive(Debug, Clone)]
pub enum ConfigMessage {
    Reloaded(Config),
    Error(String),
}

/// Subscription that watches the config file for changes
pub fn config_subscription() -> iced::Subscription<ConfigMessage> {
    iced::Subscription::run(config_watcher)
}

fn config_watcher() -> impl Stream<Item = ConfigMessage> {
    stream::channel(100, |mut output| async move {
        let path = config_path();
        let watch_path = path.parent().map(|p| p.to_path_buf()).unwrap_or(path.clone());

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(10);

        let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                let _ = output
                    .send(ConfigMessage::Error(format!("Failed to create watcher: {}", e)))
                    .await;
                std::future::pending::<()>().await;
                return;
            }
        };

        if let Err(e) = watcher.watch(&watch_path, RecursiveMode::NonRecursive) {
            let _ = output
                .send(ConfigMessage::Error(format!("Failed to watch config: {}", e)))
                .await;
        }

        while let Some(event) = rx.recv().await {
            if !matches!(
                event.kind,
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
            ) {
                continue;
            }
            let is_config_file = event
                .paths
                .iter()
                .any(|p| p.file_name().is_some_and(|n| n == "config.toml"));
            if !is_config_file {
                continue;
            }

            // Small delay to ensure file is fully written
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            let message = match Config::load() {
                Ok(config) => ConfigMessage::Reloaded(config),
                Err(e) => ConfigMessage::Error(format!("Failed to reload config: {}", e)),
            };
            let _ = output.send(message).await;
        }
    })
}

// ============================================================================
// Observable configuration
// ============================================================================

/// Receives option-changed callbacks from a [`TrayConfig`].
pub trait Configurable {
    fn update_option_separators(&self) {}
    fn update_option_menus(&self) {}
    fn update_option_name(&self) {}
}

/// Token returned by [`TrayConfig::add_configurable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigurableId(u64);

/// Live tray options. Setters notify registered observers when the value
/// actually changes.
pub struct TrayConfig {
    name: RefCell<String>,
    separators: Cell<Separators>,
    menus: Cell<Side>,
    configurables: RefCell<Vec<(ConfigurableId, Weak<dyn Configurable>)>>,
    next_id: Cell<u64>,
}

impl std::fmt::Debug for TrayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrayConfig")
            .field("name", &self.name.borrow())
            .field("separators", &self.separators.get())
            .field("menus", &self.menus.get())
            .finish()
    }
}

impl TrayConfig {
    pub fn new(options: &TrayOptions) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(options.name.clone()),
            separators: Cell::new(options.separators),
            menus: Cell::new(options.menus),
            configurables: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn separators(&self) -> Separators {
        self.separators.get()
    }

    pub fn menus(&self) -> Side {
        self.menus.get()
    }

    pub fn set_separators(&self, separators: Separators) {
        if self.separators.replace(separators) != separators {
            debug!(?separators, "separators option changed");
            self.notify(|c| c.update_option_separators());
        }
    }

    pub fn set_menus(&self, side: Side) {
        if self.menus.replace(side) != side {
            debug!(?side, "menus option changed");
            self.notify(|c| c.update_option_menus());
        }
    }

    pub fn set_name(&self, name: &str) {
        if *self.name.borrow() == name {
            return;
        }
        *self.name.borrow_mut() = name.to_owned();
        self.notify(|c| c.update_option_name());
    }

    /// Apply reloaded options.
    pub fn apply(&self, options: &TrayOptions) {
        self.set_name(&options.name);
        self.set_separators(options.separators);
        self.set_menus(options.menus);
    }

    pub fn add_configurable(&self, configurable: Weak<dyn Configurable>) -> ConfigurableId {
        let id = ConfigurableId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.configurables.borrow_mut().push((id, configurable));
        id
    }

    pub fn remove_configurable(&self, id: ConfigurableId) -> bool {
        let mut configurables = self.configurables.borrow_mut();
        let before = configurables.len();
        configurables.retain(|(other, _)| *other != id);
        configurables.len() != before
    }

    pub fn configurable_count(&self) -> usize {
        self.configurables.borrow().len()
    }

    fn notify(&self, f: impl Fn(&dyn Configurable)) {
        let live: Vec<Rc<dyn Configurable>> = {
            let mut configurables = self.configurables.borrow_mut();
            configurables.retain(|(_, weak)| weak.strong_count() > 0);
            configurables.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        for configurable in live {
            f(configurable.as_ref());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconConfigEvent {
    SizeChanged,
}

/// Icon layout options shared by a tray and its icons. Orientation is fixed
/// for the config's lifetime; the size follows the container.
#[derive(Debug)]
pub struct IconConfig {
    vertical: bool,
    size: Cell<u32>,
    signals: Signals<IconConfigEvent>,
}

impl IconConfig {
    pub fn new(vertical: bool, size: u32) -> Rc<Self> {
        Rc::new(Self {
            vertical,
            size: Cell::new(size),
            signals: Signals::new(),
        })
    }

    pub fn from_options(options: &IconOptions) -> Rc<Self> {
        Self::new(options.vertical, options.size)
    }

    pub fn vertical(&self) -> bool {
        self.vertical
    }

    pub fn size(&self) -> u32 {
        self.size.get()
    }

    pub fn set_size(&self, size: u32) {
        if self.size.replace(size) != size {
            self.signals.emit(IconConfigEvent::SizeChanged);
        }
    }

    pub fn connect_size_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + 'static,
    {
        self.signals.connect(IconConfigEvent::SizeChanged, handler)
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.signals.disconnect(id)
    }
}
