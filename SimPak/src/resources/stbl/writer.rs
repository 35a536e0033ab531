//! STBL writing

use super::{HEADER_SIZE, MAGIC, StringEntry, VERSION};
use crate::base::MappedEntry;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Serialize string entries in the order given
///
/// # Errors
///
/// Returns [`Error::ValueOutOfRange`] if a string does not fit its `u16`
/// length field, or if the strings together exceed `u32::MAX` bytes.
pub(crate) fn write_stbl<'a>(entries: impl Iterator<Item = &'a StringEntry>) -> Result<Vec<u8>> {
    let entries: Vec<&StringEntry> = entries.collect();

    let mut lengths = Vec::with_capacity(entries.len());
    let mut string_bytes: u64 = 0;
    for entry in &entries {
        let length = u16::try_from(entry.string().len()).map_err(|_| Error::ValueOutOfRange {
            field: "string length",
            value: entry.string().len() as u64,
            max: u64::from(u16::MAX),
        })?;
        string_bytes += u64::from(length) + 1;
        lengths.push(length);
    }
    let string_bytes = u32::try_from(string_bytes).map_err(|_| Error::ValueOutOfRange {
        field: "string table size",
        value: string_bytes,
        max: u64::from(u32::MAX),
    })?;

    let body: usize = lengths.iter().map(|&len| 7 + usize::from(len)).sum();
    let mut buffer = Vec::with_capacity(HEADER_SIZE + body);

    buffer.write_all(&MAGIC)?;
    buffer.write_u16::<LittleEndian>(VERSION)?;
    buffer.write_u8(0)?; // not compressed
    buffer.write_u64::<LittleEndian>(entries.len() as u64)?;
    buffer.write_all(&[0, 0])?;
    buffer.write_u32::<LittleEndian>(string_bytes)?;

    for (entry, length) in entries.iter().zip(lengths) {
        buffer.write_u32::<LittleEndian>(*entry.key())?;
        buffer.write_u8(0)?; // flags
        buffer.write_u16::<LittleEndian>(length)?;
        buffer.write_all(entry.string().as_bytes())?;
    }

    Ok(buffer)
}
