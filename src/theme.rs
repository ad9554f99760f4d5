//! Theme compilation (spec §4.4): a plist `.tmTheme` document compiled into
//! a selector-sorted style table plus a default style, and the lookup
//! (`find_style`) that merges every matching selector's style in order.
//!
//! Grounded on `Theme::readThemeFile`/`Theme::format`/`Theme::mergeFormat`
//! in `examples/original_source/src/highlighter.cpp`. The original only ever
//! merges a single rule's own dotted name onto an immediate base format; this
//! module instead matches the full open [`ScopePath`](crate::scope::ScopePath)
//! against every selector in the theme, which is the richer algorithm spec
//! §4.3/§4.4 spell out explicitly (and which the original's own, unused
//! `ScopeSelector` class already hints was the intended design).

use std::collections::HashMap;

use crate::plist::Value;
use crate::scope::{ScopePath, ScopeSelector};
use crate::style::{Color, Style};

/// A compiled theme: an ordered table of (selector, style) pairs plus the
/// style applied when no selector matches.
#[derive(Debug, Clone)]
pub struct Theme {
    entries: Vec<(ScopeSelector, Style)>,
    default_style: Style,
}

impl Theme {
    /// Compiles a theme from its plist root (a dict with a `settings` array,
    /// each entry an optional `scope` string plus a `settings` dict).
    pub fn from_plist(theme: &Value) -> Theme {
        let mut entries = Vec::new();
        let mut default_style = Style::default();

        let Some(settings) = theme.get_array("settings") else {
            tracing::warn!("theme has no top-level settings array, producing an empty theme");
            return Theme { entries, default_style };
        };

        for entry in settings {
            let style = entry
                .get_dict("settings")
                .map(style_from_settings_dict)
                .unwrap_or_default();

            match entry.get_str("scope") {
                None => default_style = default_style.merge(&style),
                Some(scopes) => {
                    for raw in scopes.split(',') {
                        let trimmed = raw.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        entries.push((ScopeSelector::parse(trimmed), style.clone()));
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Theme { entries, default_style }
    }

    /// Merges the default style with every selector that matches `path`, in
    /// selector order (spec §4.4: "style = fold over every matching entry,
    /// in selector order, merging each onto the accumulator").
    pub fn find_style(&self, path: &ScopePath) -> Style {
        let mut style = self.default_style.clone();
        for (selector, entry_style) in &self.entries {
            if selector.matches(path) {
                style = style.merge(entry_style);
            }
        }
        style
    }
}

fn style_from_settings_dict(settings: &HashMap<String, Value>) -> Style {
    let mut style = Style::default();
    for (key, value) in settings {
        let Some(text) = value.as_str() else {
            tracing::warn!(key, "theme setting value is not a string, ignoring");
            continue;
        };
        match key.as_str() {
            "foreground" => style.foreground = parse_or_warn(key, text),
            "background" => style.background = parse_or_warn(key, text),
            "caret" => style.caret = parse_or_warn(key, text),
            "fontStyle" => {
                let (bold, italic, underline) = parse_font_style(text);
                style.bold = Some(bold);
                style.italic = Some(italic);
                style.underline = Some(underline);
            }
            other => tracing::warn!(key = other, "unknown theme setting key, ignoring"),
        }
    }
    style
}

fn parse_or_warn(key: &str, text: &str) -> Option<Color> {
    match Color::parse(text) {
        Some(color) => Some(color),
        None => {
            tracing::warn!(key, value = text, "unparseable theme color, ignoring");
            None
        }
    }
}

fn parse_font_style(text: &str) -> (bool, bool, bool) {
    let (mut bold, mut italic, mut underline) = (false, false, false);
    for flag in text.split_whitespace() {
        match flag {
            "bold" => bold = true,
            "italic" => italic = true,
            "underline" => underline = true,
            other => tracing::warn!(flag = other, "unknown fontStyle flag, ignoring"),
        }
    }
    (bold, italic, underline)
}
