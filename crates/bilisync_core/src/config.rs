//! Store configuration.

/// Configuration for opening a [`crate::LocalStore`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the log after every write batch.
    pub sync_on_write: bool,

    /// Compact automatically once dead frames exceed this share of the log
    /// (0.0..=1.0). `None` disables automatic compaction.
    pub compaction_ratio: Option<f64>,

    /// Logs smaller than this many frames are never compacted automatically.
    pub compaction_min_frames: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            compaction_ratio: Some(0.5),
            compaction_min_frames: 4096,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync after every write batch.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the dead-frame ratio that triggers compaction.
    #[must_use]
    pub const fn compaction_ratio(mut self, ratio: Option<f64>) -> Self {
        self.compaction_ratio = ratio;
        self
    }

    /// Sets the minimum log length for automatic compaction.
    #[must_use]
    pub const fn compaction_min_frames(mut self, frames: u64) -> Self {
        self.compaction_min_frames = frames;
        self
    }

    /// Whether a log with `frames` frames of which `live` are live should
    /// be compacted.
    #[must_use]
    pub fn should_compact(&self, frames: u64, live: u64) -> bool {
        let Some(ratio) = self.compaction_ratio else {
            return false;
        };
        if frames < self.compaction_min_frames || frames == 0 {
            return false;
        }
        let dead = frames.saturating_sub(live);
        (dead as f64) / (frames as f64) > ratio
    }
}
