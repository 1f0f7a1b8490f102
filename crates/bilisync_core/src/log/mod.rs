//! Append-only record log.
//!
//! All three collections share one log file. Replaying it front to back
//! rebuilds the store; the frame with the highest sequence number for a
//! `(collection, key)` pair is the live version.
//!
//! ## Frame Format
//!
//! ```text
//! | frame_len (4) | collection (4) | key (8) | flags (1) | sequence (8) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. `frame_len` counts the whole frame.
//! Flags:
//! - `0x01` = tombstone (record deleted, empty payload)
//!
//! A frame cut short at the end of the log is a torn write and is dropped
//! on open. A checksum mismatch anywhere is corruption.

mod compaction;
mod record;
mod store;

pub use compaction::{CompactionResult, Compactor};
pub use record::{compute_crc32, LogFlags, LogRecord};
pub use store::{parse_frames, RecordLog};
