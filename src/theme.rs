use iced::{Color, Theme};

use crate::config::{parse_hex_color, parse_hex_color_with_alpha, ThemeConfig};

/// Resolved colors and metrics the tray draws with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppTheme {
    pub font_size: f32,
    pub icon_spacing: f32,
    background: Color,
    text: Color,
    accent: Color,
    surface: Color,
    border: Color,
    muted: Color,
    hover: Color,
}

impl Default for AppTheme {
    fn default() -> Self {
        Self::from(&ThemeConfig::default())
    }
}

impl From<&ThemeConfig> for AppTheme {
    fn from(config: &ThemeConfig) -> Self {
        Self {
            font_size: config.font_size,
            icon_spacing: config.icon_spacing,
            background: parse_hex_color_with_alpha(&config.background, config.background_alpha),
            text: parse_hex_color(&config.text),
            accent: parse_hex_color(&config.accent),
            surface: parse_hex_color(&config.surface),
            border: parse_hex_color(&config.border),
            muted: parse_hex_color(&config.muted),
            hover: parse_hex_color_with_alpha(&config.hover, config.hover_alpha),
        }
    }
}

impl AppTheme {
    pub fn background(&self) -> Color {
        self.background
    }

    pub fn text(&self) -> Color {
        self.text
    }

    pub fn accent(&self) -> Color {
        self.accent
    }

    pub fn surface(&self) -> Color {
        self.surface
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn muted(&self) -> Color {
        self.muted
    }

    pub fn hover(&self) -> Color {
        self.hover
    }

    /// Background of an icon whose menu is open.
    pub fn active(&self) -> Color {
        Color {
            a: (self.hover.a * 1.5).min(1.0),
            ..self.hover
        }
    }
}

impl From<AppTheme> for Theme {
    fn from(theme: AppTheme) -> Self {
        Theme::custom(
            String::from("trayline"),
            iced::theme::Palette {
                background: theme.background,
                text: theme.text,
                primary: theme.background,
                success: theme.accent,
                danger: theme.accent,
            },
        )
    }
}
