//! Terminal styling helpers with NO_COLOR support.

use std::io::IsTerminal;

use unicode_width::UnicodeWidthChar;

/// Color is on for a terminal stdout unless `NO_COLOR` is set.
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Terminal style helper that respects NO_COLOR.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Create a style with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    /// Create a style with colors explicitly disabled.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn code(&self, code: &'static str) -> &'static str {
        if self.enabled {
            code
        } else {
            ""
        }
    }

    pub fn dim_start(&self) -> &'static str {
        self.code("\x1b[2m")
    }

    pub fn bold_start(&self) -> &'static str {
        self.code("\x1b[1m")
    }

    pub fn red_start(&self) -> &'static str {
        self.code("\x1b[31m")
    }

    pub fn green_start(&self) -> &'static str {
        self.code("\x1b[32m")
    }

    pub fn cyan_start(&self) -> &'static str {
        self.code("\x1b[36m")
    }

    pub fn reset(&self) -> &'static str {
        self.code("\x1b[0m")
    }
}

/// Display width of a string in terminal columns, ignoring ANSI escapes.
pub fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if c == '\x1b' {
            in_escape = true;
        } else {
            width += c.width().unwrap_or(0);
        }
    }
    width
}

/// Right-pad `s` with spaces to `width` columns.
pub fn pad_to(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(visible_width(s));
    format!("{s}{}", " ".repeat(pad))
}
