//! Canopy Record Codec
//!
//! Encodes one participant's gather contribution as a self-describing record.
//!
//! # Layout
//!
//! ```text
//! +----------------+-------------------+------------------------------+
//! | source_rank u64| element_count u64 | element 0 | element 1 | ...  |
//! +----------------+-------------------+------------------------------+
//! ```
//!
//! The two header words are little-endian. Elements are written back to back
//! by an [`ElementCodec`]; [`BincodeCodec`] handles any `serde` type.
//!
//! The codec knows nothing about trees or slots. Records are opaque
//! [`EncodedRecord`] buffers until the root decodes them.

mod element;
mod error;
mod record;

pub use element::{BincodeCodec, ElementCodec};
pub use error::{CodecError, Result};
pub use record::{DecodedRecord, EncodedRecord, RecordCodec, RecordElements, RecordHeader, HEADER_LEN};

/// Encode `elements` for `rank` with the bincode element codec.
pub fn encode_bincode<T>(rank: u64, elements: &[T]) -> Result<EncodedRecord>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    RecordCodec::new(BincodeCodec::<T>::new()).encode(rank, elements)
}

/// Decode a record written by [`encode_bincode`] into its header and elements.
pub fn decode_bincode<T>(record: &EncodedRecord) -> Result<(RecordHeader, Vec<T>)>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let codec = RecordCodec::new(BincodeCodec::<T>::new());
    let decoded = codec.decode(record)?;
    let header = decoded.header();
    Ok((header, decoded.into_vec()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bincode_helpers_roundtrip() {
        let record = encode_bincode(3, &[30u32, 31]).unwrap();
        let (header, values) = decode_bincode::<u32>(&record).unwrap();
        assert_eq!(header.source_rank, 3);
        assert_eq!(header.element_count, 2);
        assert_eq!(values, vec![30, 31]);
    }

    #[test]
    fn strings_roundtrip() {
        let words = vec!["alpha".to_string(), String::new(), "gamma".to_string()];
        let record = encode_bincode(9, &words).unwrap();
        let (header, values) = decode_bincode::<String>(&record).unwrap();
        assert_eq!(header.source_rank, 9);
        assert_eq!(values, words);
    }
}
