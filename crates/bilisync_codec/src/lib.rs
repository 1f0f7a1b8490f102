//! # bilisync codec
//!
//! CBOR payload encoding for records kept in the bilisync record log.
//!
//! Every history record, favorite folder and favorite resource is stored as
//! one CBOR item inside a log frame. The encoding is driven by `serde`, so
//! fields added later decode as their `#[serde(default)]` value when older
//! frames are replayed.
//!
//! ## Usage
//!
//! ```
//! use bilisync_codec::{from_cbor, to_cbor};
//!
//! let bytes = to_cbor(&("BV1xx411c7mD", 1_700_000_000u64)).unwrap();
//! let decoded: (String, u64) = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded.1, 1_700_000_000);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value as a single CBOR item.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes exactly one CBOR item from `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] if the bytes are not a valid
/// encoding of `T`, or [`CodecError::TrailingBytes`] if anything follows the item.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: u64,
        title: String,
        cover: Option<String>,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct EntryV2 {
        id: u64,
        title: String,
        #[serde(default)]
        tag_name: String,
    }

    #[test]
    fn record_with_unicode_title() {
        let entry = Entry {
            id: 170001,
            title: "【官方】已失效视频".to_string(),
            cover: None,
        };
        let bytes = to_cbor(&entry).unwrap();
        assert_eq!(from_cbor::<Entry>(&bytes).unwrap(), entry);
    }

    #[test]
    fn newer_schema_reads_older_payload() {
        let bytes = to_cbor(&Entry {
            id: 1,
            title: "old".to_string(),
            cover: Some("http://i0.hdslb.com/a.jpg".to_string()),
        })
        .unwrap();

        let upgraded: EntryV2 = from_cbor(&bytes).unwrap();
        assert_eq!(upgraded.id, 1);
        assert_eq!(upgraded.tag_name, "");
    }

    #[test]
    fn garbage_is_rejected() {
        let result: CodecResult<Entry> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = to_cbor(&42u64).unwrap();
        bytes.push(0x00);
        let result: CodecResult<u64> = from_cbor(&bytes);
        assert_eq!(result, Err(CodecError::TrailingBytes { remaining: 1 }));
    }

    proptest::proptest! {
        #[test]
        fn any_title_survives(title in ".*", id in proptest::num::u64::ANY) {
            let entry = Entry { id, title, cover: None };
            let bytes = to_cbor(&entry).unwrap();
            proptest::prop_assert_eq!(from_cbor::<Entry>(&bytes).unwrap(), entry);
        }
    }
}
