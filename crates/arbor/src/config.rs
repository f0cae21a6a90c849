#![forbid(unsafe_code)]

//! View configuration.

use std::time::Duration;

use arbor_core::click::ClickConfig;

use crate::edit::DEFAULT_ARM_DELAY;
use crate::layout::{AutoRowLayout, FixedRowLayout, RowLayout};
use crate::search::DEFAULT_SEARCH_TIMEOUT;

/// Row height strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHeight {
    /// Every row is exactly this tall.
    Fixed(u32),
    /// Rows are measured; `preferred` is used when nothing can be measured.
    Auto {
        /// Fallback height.
        preferred: u32,
    },
}

impl Default for RowHeight {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl RowHeight {
    pub(crate) fn build<T>(self) -> Box<dyn RowLayout<T>> {
        match self {
            Self::Fixed(h) => Box::new(FixedRowLayout::new(h)),
            Self::Auto { preferred } => Box::new(AutoRowLayout::new(preferred)),
        }
    }
}

/// Tree view configuration.
#[derive(Debug, Clone)]
pub struct TreeViewConfig {
    /// Row height strategy (default: fixed, 1).
    pub row_height: RowHeight,

    /// Horizontal indentation per depth level (default: 2).
    pub indent: u32,

    /// Whether the root is drawn as row 0 (default: false).
    pub show_root: bool,

    /// Start editing immediately on a click on the selected row instead of
    /// arming the timer (default: false).
    pub edit_on_click: bool,

    /// Lay renderers out in explicit columns (default: false).
    pub use_columns: bool,

    /// Delay between a qualifying click and the start of editing (default: 500ms).
    pub arm_delay: Duration,

    /// Keystroke window for incremental search (default: 300ms).
    pub search_timeout: Duration,

    /// Single/double click classification.
    pub click: ClickConfig,
}

impl Default for TreeViewConfig {
    fn default() -> Self {
        Self {
            row_height: RowHeight::default(),
            indent: 2,
            show_root: false,
            edit_on_click: false,
            use_columns: false,
            arm_delay: DEFAULT_ARM_DELAY,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            click: ClickConfig::default(),
        }
    }
}

impl TreeViewConfig {
    /// Set the row height strategy.
    #[must_use]
    pub fn with_row_height(mut self, row_height: RowHeight) -> Self {
        self.row_height = row_height;
        self
    }

    /// Set the per-level indentation.
    #[must_use]
    pub fn with_indent(mut self, indent: u32) -> Self {
        self.indent = indent;
        self
    }

    /// Show or hide the root row.
    #[must_use]
    pub fn with_show_root(mut self, show_root: bool) -> Self {
        self.show_root = show_root;
        self
    }

    /// Enable or disable immediate edit on click.
    #[must_use]
    pub fn with_edit_on_click(mut self, edit_on_click: bool) -> Self {
        self.edit_on_click = edit_on_click;
        self
    }

    /// Enable or disable explicit columns.
    #[must_use]
    pub fn with_columns(mut self, use_columns: bool) -> Self {
        self.use_columns = use_columns;
        self
    }

    /// Set the arm delay.
    #[must_use]
    pub fn with_arm_delay(mut self, delay: Duration) -> Self {
        self.arm_delay = delay;
        self
    }

    /// Set the search timeout.
    #[must_use]
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Set the click classification config.
    #[must_use]
    pub fn with_click(mut self, click: ClickConfig) -> Self {
        self.click = click;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TreeViewConfig::default();
        assert_eq!(config.row_height, RowHeight::Fixed(1));
        assert_eq!(config.indent, 2);
        assert!(!config.show_root);
        assert!(!config.edit_on_click);
        assert!(!config.use_columns);
        assert_eq!(config.arm_delay, Duration::from_millis(500));
        assert_eq!(config.search_timeout, Duration::from_millis(300));
        assert_eq!(config.click.double_click_interval, Duration::from_millis(400));
    }

    #[test]
    fn builders_chain() {
        let config = TreeViewConfig::default()
            .with_row_height(RowHeight::Auto { preferred: 3 })
            .with_indent(4)
            .with_show_root(true)
            .with_edit_on_click(true)
            .with_columns(true)
            .with_arm_delay(Duration::from_millis(250))
            .with_search_timeout(Duration::from_secs(1))
            .with_click(ClickConfig::with_interval(Duration::from_millis(200)));
        assert_eq!(config.row_height, RowHeight::Auto { preferred: 3 });
        assert_eq!(config.indent, 4);
        assert!(config.show_root && config.edit_on_click && config.use_columns);
        let layout = config.row_height.build::<()>();
        assert_eq!(layout.preferred_row_height(), 3);
    }
}
