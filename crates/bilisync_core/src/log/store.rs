//! The record log on top of a storage backend.

use crate::error::{CoreError, CoreResult};
use crate::log::record::LogRecord;
use crate::types::{CollectionId, SequenceNumber};
use bilisync_storage::StorageBackend;

/// Splits a log image into frames.
///
/// Returns the decoded frames and the length of the valid prefix. A frame
/// whose length runs past the end of `data` is a torn write and ends the
/// scan; every complete frame must pass its checksum.
///
/// # Errors
///
/// Returns an error on a checksum mismatch or a malformed frame.
pub fn parse_frames(data: &[u8]) -> CoreResult<(Vec<LogRecord>, usize)> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < 4 {
            break;
        }
        let len_bytes = &data[offset..offset + 4];
        let frame_len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

        if frame_len < LogRecord::HEADER_SIZE + LogRecord::CRC_SIZE {
            return Err(CoreError::log_corruption(
                offset as u64,
                format!("impossible frame length {frame_len}"),
            ));
        }
        if frame_len > remaining {
            break;
        }

        let record = LogRecord::decode(&data[offset..offset + frame_len], offset as u64)?;
        records.push(record);
        offset += frame_len;
    }

    Ok((records, offset))
}

/// Append-only log of record frames.
///
/// The log assigns sequence numbers and counts frames so the store can
/// decide when compaction pays off. It does not interpret payloads.
pub struct RecordLog {
    backend: Box<dyn StorageBackend>,
    next_sequence: SequenceNumber,
    frames: u64,
}

impl RecordLog {
    /// Opens a log, replaying every frame already in `backend`.
    ///
    /// A torn tail frame is cut off so later appends start on a frame
    /// boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or a complete frame is corrupt.
    pub fn open(mut backend: Box<dyn StorageBackend>) -> CoreResult<(Self, Vec<LogRecord>)> {
        let data = backend.read_all()?;
        let (records, valid_len) = parse_frames(&data)?;

        if valid_len < data.len() {
            tracing::warn!(
                valid_len,
                dropped = data.len() - valid_len,
                "dropping torn frame at end of record log"
            );
            backend.truncate(valid_len as u64)?;
        }

        let next_sequence = records
            .iter()
            .map(|r| r.sequence)
            .max()
            .map_or(SequenceNumber::new(1), SequenceNumber::next);

        let log = Self {
            backend,
            next_sequence,
            frames: records.len() as u64,
        };
        Ok((log, records))
    }

    fn append(&mut self, record: &LogRecord) -> CoreResult<SequenceNumber> {
        self.backend.append(&record.encode())?;
        self.frames += 1;
        self.next_sequence = self.next_sequence.max(record.sequence.next());
        Ok(record.sequence)
    }

    /// Appends a put frame and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    pub fn put(
        &mut self,
        collection: CollectionId,
        key: u64,
        payload: Vec<u8>,
    ) -> CoreResult<SequenceNumber> {
        let record = LogRecord::put(collection, key, payload, self.next_sequence);
        self.append(&record)
    }

    /// Appends a tombstone and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    pub fn delete(&mut self, collection: CollectionId, key: u64) -> CoreResult<SequenceNumber> {
        let record = LogRecord::tombstone(collection, key, self.next_sequence);
        self.append(&record)
    }

    /// Flushes appended frames, and syncs them to disk when `sync` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    pub fn flush(&mut self, sync: bool) -> CoreResult<()> {
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Reads every frame currently in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or is corrupt.
    pub fn scan(&self) -> CoreResult<Vec<LogRecord>> {
        let data = self.backend.read_all()?;
        Ok(parse_frames(&data)?.0)
    }

    /// Replaces the log contents with `records` in place.
    ///
    /// Used for backends that have no separate file to swap in.
    ///
    /// # Errors
    ///
    /// Returns an error if truncation or any append fails.
    pub fn rewrite_in_place(&mut self, records: &[LogRecord]) -> CoreResult<()> {
        self.backend.truncate(0)?;
        self.frames = 0;
        for record in records {
            self.append(record)?;
        }
        self.flush(true)
    }

    /// Swaps in a backend that already holds `frames` compacted frames.
    pub fn install(&mut self, backend: Box<dyn StorageBackend>, frames: u64) {
        self.backend = backend;
        self.frames = frames;
    }

    /// Number of frames in the log, live or dead.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Sequence number the next frame will get.
    #[must_use]
    pub fn next_sequence(&self) -> SequenceNumber {
        self.next_sequence
    }

    /// Size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

impl std::fmt::Debug for RecordLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("next_sequence", &self.next_sequence)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bilisync_storage::InMemoryBackend;

    fn empty_log() -> RecordLog {
        RecordLog::open(Box::new(InMemoryBackend::new())).unwrap().0
    }

    #[test]
    fn sequences_increase() {
        let mut log = empty_log();
        let a = log.put(CollectionId::HISTORY, 1, vec![1]).unwrap();
        let b = log.delete(CollectionId::HISTORY, 1).unwrap();
        assert!(b > a);
        assert_eq!(log.frame_count(), 2);
    }

    #[test]
    fn reopen_replays_frames_and_continues_sequence() {
        let mut log = empty_log();
        log.put(CollectionId::HISTORY, 1, vec![0xA0]).unwrap();
        log.put(CollectionId::FOLDERS, 2, vec![0xA0]).unwrap();
        let image = log.scan().unwrap();
        let bytes: Vec<u8> = image.iter().flat_map(LogRecord::encode).collect();

        let (reopened, replayed) =
            RecordLog::open(Box::new(InMemoryBackend::with_data(bytes))).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[1].collection, CollectionId::FOLDERS);
        assert_eq!(reopened.next_sequence(), SequenceNumber::new(3));
    }

    #[test]
    fn torn_tail_is_dropped() {
        let good = LogRecord::put(CollectionId::HISTORY, 1, vec![1, 2], SequenceNumber::new(1));
        let torn = LogRecord::put(CollectionId::HISTORY, 2, vec![3, 4], SequenceNumber::new(2));
        let mut bytes = good.encode();
        let torn_bytes = torn.encode();
        bytes.extend_from_slice(&torn_bytes[..torn_bytes.len() - 3]);

        let (mut log, replayed) =
            RecordLog::open(Box::new(InMemoryBackend::with_data(bytes))).unwrap();
        assert_eq!(replayed, vec![good.clone()]);
        assert_eq!(log.size().unwrap(), good.encoded_size() as u64);

        log.put(CollectionId::HISTORY, 3, vec![5]).unwrap();
        assert_eq!(log.scan().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_complete_frame_fails_open() {
        let mut bytes =
            LogRecord::put(CollectionId::HISTORY, 1, vec![9; 8], SequenceNumber::new(1)).encode();
        bytes[27] ^= 0x01;
        let result = RecordLog::open(Box::new(InMemoryBackend::with_data(bytes)));
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn rewrite_in_place_replaces_contents() {
        let mut log = empty_log();
        for key in 0..5 {
            log.put(CollectionId::HISTORY, key, vec![0]).unwrap();
        }
        let keep = vec![LogRecord::put(
            CollectionId::HISTORY,
            4,
            vec![0],
            SequenceNumber::new(5),
        )];
        log.rewrite_in_place(&keep).unwrap();

        assert_eq!(log.frame_count(), 1);
        assert_eq!(log.scan().unwrap(), keep);
        assert_eq!(log.next_sequence(), SequenceNumber::new(6));
    }
}
