//! Record encoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::element::ElementCodec;
use crate::error::{CodecError, Result};

/// Size of the fixed header: source rank and element count.
pub const HEADER_LEN: usize = 16;

/// An encoded record as transported between participants.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedRecord(Bytes);

impl EncodedRecord {
    /// Wrap raw bytes. The bytes are not validated until decoded.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the buffer is empty (never true for a valid record).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the header without touching the elements.
    pub fn header(&self) -> Result<RecordHeader> {
        RecordHeader::parse(&self.0)
    }
}

/// Source rank and element count at the front of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    /// Relative rank of the contributing participant.
    pub source_rank: u64,
    /// Number of elements that follow.
    pub element_count: u64,
}

impl RecordHeader {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }
        let word = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(raw)
        };
        Ok(Self {
            source_rank: word(0),
            element_count: word(8),
        })
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.source_rank.to_le_bytes());
        buf.extend_from_slice(&self.element_count.to_le_bytes());
    }

    /// Element count as `usize`.
    pub fn len(&self) -> Result<usize> {
        usize::try_from(self.element_count).map_err(|_| CodecError::CountOverflow(self.element_count))
    }

    /// Check if the record carries no elements.
    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }
}

/// Encodes and decodes records with a given element codec.
#[derive(Debug, Clone, Default)]
pub struct RecordCodec<C> {
    codec: C,
}

impl<C: ElementCodec> RecordCodec<C> {
    /// Create a record codec around an element codec.
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Get the element codec.
    pub fn element_codec(&self) -> &C {
        &self.codec
    }

    /// Encode `rank`, `elements.len()`, then every element.
    pub fn encode(&self, rank: u64, elements: &[C::Element]) -> Result<EncodedRecord> {
        let header = RecordHeader {
            source_rank: rank,
            element_count: elements.len() as u64,
        };

        let mut buf = Vec::with_capacity(HEADER_LEN + elements.len() * 8);
        header.write(&mut buf);
        for element in elements {
            self.codec.encode_into(element, &mut buf)?;
        }
        Ok(EncodedRecord(Bytes::from(buf)))
    }

    /// Parse the header and return a lazy view over the elements.
    pub fn decode<'a>(&'a self, record: &'a EncodedRecord) -> Result<DecodedRecord<'a, C>> {
        let header = record.header()?;
        Ok(DecodedRecord {
            header,
            body: &record.0[HEADER_LEN..],
            codec: &self.codec,
        })
    }
}

/// A record whose header has been read. Elements decode on demand.
#[derive(Debug)]
pub struct DecodedRecord<'a, C> {
    header: RecordHeader,
    body: &'a [u8],
    codec: &'a C,
}

impl<'a, C: ElementCodec> DecodedRecord<'a, C> {
    /// The record header.
    pub fn header(&self) -> RecordHeader {
        self.header
    }

    /// Relative rank of the contributor.
    pub fn source_rank(&self) -> u64 {
        self.header.source_rank
    }

    /// Declared number of elements.
    pub fn element_count(&self) -> u64 {
        self.header.element_count
    }

    /// Lazily decode the elements in order.
    pub fn elements(self) -> RecordElements<'a, C> {
        RecordElements {
            remaining: self.header.element_count,
            body: self.body,
            codec: self.codec,
        }
    }

    /// Decode every element, rejecting trailing bytes.
    pub fn into_vec(self) -> Result<Vec<C::Element>> {
        // Untrusted count: never reserve more slots than body bytes.
        let capacity = self.header.len()?.min(self.body.len());
        let mut elements = self.elements();
        let mut out = Vec::with_capacity(capacity);
        for element in elements.by_ref() {
            out.push(element?);
        }
        elements.finish()?;
        Ok(out)
    }
}

/// Iterator over the elements of a [`DecodedRecord`].
///
/// Stops after the first error.
#[derive(Debug)]
pub struct RecordElements<'a, C> {
    remaining: u64,
    body: &'a [u8],
    codec: &'a C,
}

impl<C> RecordElements<'_, C> {
    /// Verify nothing follows the last element. Call after exhausting the iterator.
    pub fn finish(&self) -> Result<()> {
        if self.body.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.body.len()))
        }
    }
}

impl<C: ElementCodec> Iterator for RecordElements<'_, C> {
    type Item = Result<C::Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.body.is_empty() {
            self.remaining = 0;
            return Some(Err(CodecError::Truncated {
                needed: 1,
                available: 0,
            }));
        }
        let element = self.codec.decode_from(&mut self.body);
        if element.is_err() {
            self.remaining = 0;
        }
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}
