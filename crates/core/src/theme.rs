use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SlidecastError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Theme colors, exposed to templates as CSS variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Palette {
    pub background: String,
    pub title: String,
    pub body: String,
    pub accent: String,
}

impl Theme {
    pub fn name(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn palette(&self) -> Palette {
        let (background, title, body, accent) = match self {
            Theme::Dark => ("#1f2937", "#ffffff", "#e5e7eb", "#00BFFF"),
            Theme::Light => ("#ffffff", "#111827", "#374151", "#00BFFF"),
        };
        Palette {
            background: background.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            accent: accent.to_string(),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Theme {
    type Err = SlidecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(SlidecastError::InvalidOptions {
                reason: format!("unknown theme '{other}' (expected dark or light)"),
            }),
        }
    }
}

impl Palette {
    /// CSS custom properties consumed by the slide template.
    pub fn css_variables(&self) -> String {
        format!(
            "--primary-color: {accent}; --background-color: {background}; \
             --title-color: {title}; --text-color: {body};",
            accent = self.accent,
            background = self.background,
            title = self.title,
            body = self.body,
        )
    }
}
