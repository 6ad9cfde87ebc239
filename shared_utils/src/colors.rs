//! Terminal color helpers

use console::Style;

/// Success (green)
pub fn success() -> Style {
    Style::new().green().bold()
}

/// Error (red)
pub fn error() -> Style {
    Style::new().red().bold()
}

/// Warning (yellow)
pub fn warning() -> Style {
    Style::new().yellow()
}

/// Info (cyan)
pub fn info() -> Style {
    Style::new().cyan()
}

/// Dimmed (gray)
pub fn dim() -> Style {
    Style::new().dim()
}
