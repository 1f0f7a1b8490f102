//! Configuration for the sync engines and scheduler.

use std::time::Duration;

/// Configuration for sync runs.
///
/// Intervals are counted in scheduler ticks; with the default one-minute
/// tick they are minutes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// History records requested per page.
    pub history_page_size: u32,
    /// Favorite resources requested per page.
    pub favorites_page_size: u32,
    /// Pause between consecutive history pages.
    pub history_page_delay: Duration,
    /// Pause between consecutive resource pages of one folder.
    pub favorites_page_delay: Duration,
    /// Scheduler tick period.
    pub tick_period: Duration,
    /// Ticks between scheduled history syncs, until overridden in settings.
    pub history_interval: u32,
    /// Ticks between scheduled favorites syncs, until overridden in settings.
    pub favorites_interval: u32,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            history_page_size: 30,
            favorites_page_size: 20,
            history_page_delay: Duration::from_millis(1000),
            favorites_page_delay: Duration::from_millis(500),
            tick_period: Duration::from_secs(60),
            history_interval: 1,
            favorites_interval: 1440,
        }
    }

    /// Sets the history page size.
    pub fn with_history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    /// Sets the favorites page size.
    pub fn with_favorites_page_size(mut self, size: u32) -> Self {
        self.favorites_page_size = size.max(1);
        self
    }

    /// Sets both page delays.
    pub fn with_page_delays(mut self, history: Duration, favorites: Duration) -> Self {
        self.history_page_delay = history;
        self.favorites_page_delay = favorites;
        self
    }

    /// Removes the page delays.
    pub fn without_delays(self) -> Self {
        self.with_page_delays(Duration::ZERO, Duration::ZERO)
    }

    /// Sets the scheduler tick period.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Sets the default intervals, in ticks.
    pub fn with_intervals(mut self, history: u32, favorites: u32) -> Self {
        self.history_interval = history.max(1);
        self.favorites_interval = favorites.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.history_page_size, 30);
        assert_eq!(config.favorites_page_size, 20);
        assert_eq!(config.history_page_delay, Duration::from_secs(1));
        assert_eq!(config.favorites_page_delay, Duration::from_millis(500));
        assert_eq!(config.tick_period, Duration::from_secs(60));
        assert_eq!((config.history_interval, config.favorites_interval), (1, 1440));
    }

    #[test]
    fn builder_clamps_zero() {
        let config = SyncConfig::new()
            .with_history_page_size(0)
            .with_intervals(0, 5)
            .without_delays();
        assert_eq!(config.history_page_size, 1);
        assert_eq!(config.history_interval, 1);
        assert_eq!(config.favorites_interval, 5);
        assert_eq!(config.favorites_page_delay, Duration::ZERO);
    }
}
