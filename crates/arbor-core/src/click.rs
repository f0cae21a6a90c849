#![forbid(unsafe_code)]

//! Single/double click classification.
//!
//! Terminals and most low-level backends only report button presses. The
//! [`ClickDetector`] turns a stream of presses into [`ClickKind::Single`] and
//! [`ClickKind::Double`] using a time window and a small distance tolerance.
//!
//! # Invariants
//! 1. A press is `Double` only if the previous press used the same button,
//!    landed within `max_distance` on both axes, and arrived within
//!    `double_click_interval`.
//! 2. After a `Double` the detector resets, so a third quick press is a
//!    fresh `Single` rather than another `Double`.

use std::time::{Duration, Instant};

use crate::event::MouseButton;

/// Configuration for click classification.
#[derive(Debug, Clone)]
pub struct ClickConfig {
    /// Maximum gap between presses of a double click (default: 400ms).
    pub double_click_interval: Duration,

    /// Maximum pointer travel between the two presses, per axis (default: 2).
    pub max_distance: u32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            double_click_interval: Duration::from_millis(400),
            max_distance: 2,
        }
    }
}

impl ClickConfig {
    /// Create a config with a custom double-click interval.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            double_click_interval: interval,
            ..Default::default()
        }
    }
}

/// Classification of a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickKind {
    /// First press, or a press too far away in time or space from the last one.
    Single,
    /// Second press of a double click.
    Double,
}

#[derive(Debug, Clone, Copy)]
struct LastPress {
    button: MouseButton,
    x: u32,
    y: u32,
    at: Instant,
}

/// Stateful single/double click detector.
#[derive(Debug, Clone, Default)]
pub struct ClickDetector {
    config: ClickConfig,
    last: Option<LastPress>,
}

impl ClickDetector {
    /// Create a detector with the given configuration.
    #[must_use]
    pub fn new(config: ClickConfig) -> Self {
        Self { config, last: None }
    }

    /// Classify a button press at `(x, y)`.
    pub fn press(&mut self, button: MouseButton, x: u32, y: u32, now: Instant) -> ClickKind {
        let is_double = self.last.is_some_and(|last| {
            last.button == button
                && last.x.abs_diff(x) <= self.config.max_distance
                && last.y.abs_diff(y) <= self.config.max_distance
                && now.saturating_duration_since(last.at) <= self.config.double_click_interval
        });

        if is_double {
            self.last = None;
            ClickKind::Double
        } else {
            self.last = Some(LastPress { button, x, y, at: now });
            ClickKind::Single
        }
    }

    /// Forget the previous press.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub fn config(&self) -> &ClickConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);
    const MS_500: Duration = Duration::from_millis(500);

    #[test]
    fn quick_second_press_is_double() {
        let mut clicks = ClickDetector::default();
        let t = Instant::now();
        assert_eq!(clicks.press(MouseButton::Left, 5, 5, t), ClickKind::Single);
        assert_eq!(
            clicks.press(MouseButton::Left, 6, 5, t + MS_100),
            ClickKind::Double
        );
    }

    #[test]
    fn slow_second_press_is_single() {
        let mut clicks = ClickDetector::default();
        let t = Instant::now();
        clicks.press(MouseButton::Left, 5, 5, t);
        assert_eq!(
            clicks.press(MouseButton::Left, 5, 5, t + MS_500),
            ClickKind::Single
        );
    }

    #[test]
    fn third_press_starts_over() {
        let mut clicks = ClickDetector::default();
        let t = Instant::now();
        clicks.press(MouseButton::Left, 0, 0, t);
        clicks.press(MouseButton::Left, 0, 0, t + MS_100);
        assert_eq!(
            clicks.press(MouseButton::Left, 0, 0, t + MS_100 * 2),
            ClickKind::Single
        );
    }

    #[test]
    fn distance_and_button_break_the_pair() {
        let mut clicks = ClickDetector::default();
        let t = Instant::now();
        clicks.press(MouseButton::Left, 0, 0, t);
        assert_eq!(
            clicks.press(MouseButton::Left, 0, 9, t + MS_100),
            ClickKind::Single
        );
        assert_eq!(
            clicks.press(MouseButton::Right, 0, 9, t + MS_100 * 2),
            ClickKind::Single
        );
    }

    #[test]
    fn reset_forgets_history() {
        let mut clicks = ClickDetector::new(ClickConfig::with_interval(MS_500));
        let t = Instant::now();
        clicks.press(MouseButton::Left, 1, 1, t);
        clicks.reset();
        assert_eq!(
            clicks.press(MouseButton::Left, 1, 1, t + MS_100),
            ClickKind::Single
        );
        assert_eq!(clicks.config().double_click_interval, MS_500);
    }
}
