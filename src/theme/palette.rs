//! Themed custom-property values applied to the document root.

use super::ThemeName;

/// A named set of CSS custom properties for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub theme: ThemeName,
    pub high_contrast: bool,
    pub properties: &'static [(&'static str, &'static str)],
}

const LIGHT: &[(&str, &str)] = &[
    ("--color-background", "#ffffff"),
    ("--color-surface", "#f4f4f5"),
    ("--color-text", "#18181b"),
    ("--color-text-muted", "#52525b"),
    ("--color-accent", "#2563eb"),
    ("--color-border", "#d4d4d8"),
];

const DARK: &[(&str, &str)] = &[
    ("--color-background", "#0b0b0f"),
    ("--color-surface", "#18181b"),
    ("--color-text", "#f4f4f5"),
    ("--color-text-muted", "#a1a1aa"),
    ("--color-accent", "#60a5fa"),
    ("--color-border", "#3f3f46"),
];

const LIGHT_HIGH_CONTRAST: &[(&str, &str)] = &[
    ("--color-background", "#ffffff"),
    ("--color-surface", "#ffffff"),
    ("--color-text", "#000000"),
    ("--color-text-muted", "#1f1f1f"),
    ("--color-accent", "#0000cc"),
    ("--color-border", "#000000"),
];

const DARK_HIGH_CONTRAST: &[(&str, &str)] = &[
    ("--color-background", "#000000"),
    ("--color-surface", "#000000"),
    ("--color-text", "#ffffff"),
    ("--color-text-muted", "#e5e5e5"),
    ("--color-accent", "#ffff00"),
    ("--color-border", "#ffffff"),
];

impl Palette {
    #[must_use]
    pub fn for_theme(theme: ThemeName, high_contrast: bool) -> Self {
        let properties = match (theme, high_contrast) {
            (ThemeName::Light, false) => LIGHT,
            (ThemeName::Dark, false) => DARK,
            (ThemeName::Light, true) => LIGHT_HIGH_CONTRAST,
            (ThemeName::Dark, true) => DARK_HIGH_CONTRAST,
        };
        Self { theme, high_contrast, properties }
    }

    /// Look up one property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static str> {
        self.properties
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}
