//! Log frame encoding.

use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, SequenceNumber};

/// Flags stored with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogFlags(u8);

impl LogFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Frame deletes the record.
    pub const TOMBSTONE: Self = Self(0x01);

    /// Creates flags from the raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Checks if the tombstone flag is set.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// One frame of the record log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Collection the record belongs to.
    pub collection: CollectionId,
    /// Primary key within the collection.
    pub key: u64,
    /// Frame flags.
    pub flags: LogFlags,
    /// Sequence number assigned on append.
    pub sequence: SequenceNumber,
    /// CBOR payload, empty for tombstones.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// len (4) + collection (4) + key (8) + flags (1) + sequence (8)
    pub const HEADER_SIZE: usize = 25;
    /// Trailing checksum.
    pub const CRC_SIZE: usize = 4;

    /// Creates a put frame.
    #[must_use]
    pub fn put(
        collection: CollectionId,
        key: u64,
        payload: Vec<u8>,
        sequence: SequenceNumber,
    ) -> Self {
        Self {
            collection,
            key,
            flags: LogFlags::NONE,
            sequence,
            payload,
        }
    }

    /// Creates a tombstone frame.
    #[must_use]
    pub fn tombstone(collection: CollectionId, key: u64, sequence: SequenceNumber) -> Self {
        Self {
            collection,
            key,
            flags: LogFlags::TOMBSTONE,
            sequence,
            payload: Vec::new(),
        }
    }

    /// Returns whether this frame deletes its record.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.flags.is_tombstone()
    }

    /// Returns the encoded size of this frame.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CRC_SIZE
    }

    /// Encodes the frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let frame_len = self.encoded_size();
        let mut buf = Vec::with_capacity(frame_len);

        buf.extend_from_slice(&(frame_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.collection.as_u32().to_le_bytes());
        buf.extend_from_slice(&self.key.to_le_bytes());
        buf.push(self.flags.as_byte());
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes one complete frame. `offset` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChecksumMismatch`] if the checksum does not match
    /// and [`CoreError::LogCorruption`] if the frame is malformed.
    pub fn decode(frame: &[u8], offset: u64) -> CoreResult<Self> {
        if frame.len() < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(CoreError::log_corruption(offset, "frame too short"));
        }
        let frame_len = read_u32(frame, 0) as usize;
        if frame_len != frame.len() {
            return Err(CoreError::log_corruption(
                offset,
                format!("length field {frame_len} does not match frame size {}", frame.len()),
            ));
        }

        let crc_at = frame_len - Self::CRC_SIZE;
        let stored_crc = read_u32(frame, crc_at);
        let computed_crc = compute_crc32(&frame[..crc_at]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let flags = LogFlags::from_byte(frame[16]);
        let payload = frame[Self::HEADER_SIZE..crc_at].to_vec();
        if flags.is_tombstone() && !payload.is_empty() {
            return Err(CoreError::log_corruption(offset, "tombstone with payload"));
        }

        Ok(Self {
            collection: CollectionId::new(read_u32(frame, 4)),
            key: read_u64(frame, 8),
            flags,
            sequence: SequenceNumber::new(read_u64(frame, 17)),
            payload,
        })
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// CRC32 (IEEE polynomial) over `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn put_frame_decodes() {
        let record = LogRecord::put(
            CollectionId::HISTORY,
            170_001,
            vec![0xA1, 0x01, 0x02],
            SequenceNumber::new(42),
        );
        let encoded = record.encode();
        assert_eq!(encoded.len(), record.encoded_size());
        assert_eq!(LogRecord::decode(&encoded, 0).unwrap(), record);
    }

    #[test]
    fn tombstone_frame_decodes() {
        let record = LogRecord::tombstone(CollectionId::RESOURCES, 7, SequenceNumber::new(9));
        let decoded = LogRecord::decode(&record.encode(), 0).unwrap();
        assert!(decoded.is_tombstone());
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn flipped_bit_is_detected() {
        let record = LogRecord::put(CollectionId::FOLDERS, 1, vec![1, 2, 3], SequenceNumber::new(1));
        let mut encoded = record.encode();
        encoded[10] ^= 0xFF;
        assert!(matches!(
            LogRecord::decode(&encoded, 0),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn short_frame_is_corruption() {
        let err = LogRecord::decode(&[0u8; 10], 128).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset: 128, .. }));
    }
}
