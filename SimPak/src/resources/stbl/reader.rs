//! STBL parsing

use super::{HEADER_SIZE, MAGIC, VERSION};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Smallest possible entry: key, flags, length and no bytes
const MIN_ENTRY_SIZE: usize = 7;

/// Parse string table bytes into `(key, string)` pairs in file order
///
/// # Errors
///
/// Returns [`Error::InvalidStringTableMagic`] or
/// [`Error::UnsupportedStringTableVersion`] for a bad header, [`Error::Io`] if
/// the data is truncated, and [`Error::Utf8Error`] for a string that is not
/// UTF-8.
pub(crate) fn read_stbl(data: &[u8]) -> Result<Vec<(u32, String)>> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::InvalidStringTableMagic(magic));
    }

    let version = cursor.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::UnsupportedStringTableVersion { version });
    }

    let _compressed = cursor.read_u8()?;
    let count = cursor.read_u64::<LittleEndian>()?;
    cursor.seek(SeekFrom::Current(2))?;
    let _string_bytes = cursor.read_u32::<LittleEndian>()?;

    // The count is untrusted; never reserve more than the data could hold
    let max_entries = data.len().saturating_sub(HEADER_SIZE) / MIN_ENTRY_SIZE;
    let capacity = usize::try_from(count).unwrap_or(usize::MAX).min(max_entries);
    let mut entries = Vec::with_capacity(capacity);

    for _ in 0..count {
        let key = cursor.read_u32::<LittleEndian>()?;
        let _flags = cursor.read_u8()?;
        let length = usize::from(cursor.read_u16::<LittleEndian>()?);

        let mut bytes = vec![0u8; length];
        cursor.read_exact(&mut bytes)?;
        entries.push((key, String::from_utf8(bytes)?));
    }

    Ok(entries)
}
