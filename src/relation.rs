//! Base-relation access used to bulk-load a new index.
//!
//! The index never interprets records beyond pulling the key out of them:
//! the indexed attribute is a little-endian `i32` stored at a fixed byte
//! offset in every record.

use crate::common::{Error, RecordId, Result};

/// Sequential scan over the records of a base relation.
///
/// Yields `(record id, record bytes)` pairs until `Ok(None)` signals end of
/// data. Any iterator of such pairs is a scan, so tests and in-memory
/// callers can pass `vec.into_iter()`.
pub trait RelationScan {
    fn scan_next(&mut self) -> Result<Option<(RecordId, Vec<u8>)>>;
}

impl<I> RelationScan for I
where
    I: Iterator<Item = (RecordId, Vec<u8>)>,
{
    fn scan_next(&mut self) -> Result<Option<(RecordId, Vec<u8>)>> {
        Ok(self.next())
    }
}

/// Read the integer key at `offset` within `record`.
///
/// # Errors
/// `Error::RecordTooShort` if the record ends before `offset + 4`.
pub fn extract_key(record: &[u8], offset: usize, rid: RecordId) -> Result<i32> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| record.get(offset..end))
        .ok_or(Error::RecordTooShort { rid, offset })?;

    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
