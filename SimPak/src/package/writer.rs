//! DBPF package writer with progress callbacks

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use super::entry::ResourceEntry;
use super::{
    HEADER_SIZE, INDEX_MINOR_VERSION, IndexRecord, MAGIC, MAJOR_VERSION, MAX_MINOR_VERSION,
    PackagePhase, PackageProgress, ProgressCallback,
};
use crate::error::{Error, Result};

/// Set in a record's file size to mark that compression info follows
const EXTENDED_COMPRESSION_BIT: u32 = 0x8000_0000;

/// Largest payload size that leaves room for the extended compression bit
const MAX_FILE_SIZE: u32 = !EXTENDED_COMPRESSION_BIT;

/// Serialize entries into a complete package, in the order given.
///
/// Payloads are laid out right after the header, followed by the index table.
/// Entries whose compressed buffer is still cached are written from it
/// without touching their resource.
pub(crate) fn write_package<'a>(
    entries: impl Iterator<Item = &'a ResourceEntry>,
    progress: ProgressCallback,
) -> Result<Vec<u8>> {
    let entries: Vec<&ResourceEntry> = entries.collect();
    let total = entries.len();

    let mut buffer = vec![0u8; HEADER_SIZE];
    let mut records = Vec::with_capacity(total);

    for (i, entry) in entries.into_iter().enumerate() {
        progress(&PackageProgress::with_key(
            PackagePhase::CompressingResources,
            i + 1,
            total,
            *entry.key(),
        ));

        let compressed = entry.compressed_buffer()?;
        let offset = u32::try_from(buffer.len()).map_err(|_| Error::ValueOutOfRange {
            field: "resource offset",
            value: buffer.len() as u64,
            max: u64::from(u32::MAX),
        })?;
        let file_size = u32::try_from(compressed.data.len())
            .ok()
            .filter(|&size| size <= MAX_FILE_SIZE)
            .ok_or(Error::ValueOutOfRange {
                field: "compressed size",
                value: compressed.data.len() as u64,
                max: u64::from(MAX_FILE_SIZE),
            })?;

        buffer.extend_from_slice(&compressed.data);
        records.push(IndexRecord {
            key: *entry.key(),
            offset,
            file_size,
            mem_size: compressed.mem_size,
            compression: compressed.compression,
            committed: 1,
        });
    }

    progress(&PackageProgress::new(PackagePhase::WritingIndex, 0, 1));
    let index_offset = buffer.len() as u64;
    write_index(&mut buffer, &records)?;
    let index_size = buffer.len() as u64 - index_offset;
    let index_size = u32::try_from(index_size).map_err(|_| Error::ValueOutOfRange {
        field: "index size",
        value: index_size,
        max: u64::from(u32::MAX),
    })?;

    let mut header = Cursor::new(&mut buffer[..HEADER_SIZE]);
    write_header(&mut header, records.len() as u32, index_size, index_offset)?;

    progress(&PackageProgress::new(PackagePhase::Complete, total, total));
    debug!(entries = total, bytes = buffer.len(), "wrote package");

    Ok(buffer)
}

fn write_header<W: Write>(
    writer: &mut W,
    index_count: u32,
    index_size: u32,
    index_offset: u64,
) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(MAJOR_VERSION)?;
    writer.write_u32::<LittleEndian>(MAX_MINOR_VERSION)?;
    // User version, flags, creation and modification dates, index major
    writer.write_all(&[0u8; 24])?;
    writer.write_u32::<LittleEndian>(index_count)?;
    writer.write_u32::<LittleEndian>(0)?; // legacy index offset
    writer.write_u32::<LittleEndian>(index_size)?;
    // Hole count, offset and size
    writer.write_all(&[0u8; 12])?;
    writer.write_u32::<LittleEndian>(INDEX_MINOR_VERSION)?;
    writer.write_u64::<LittleEndian>(index_offset)?;
    writer.write_all(&[0u8; 24])?;
    Ok(())
}

fn write_index<W: Write>(writer: &mut W, records: &[IndexRecord]) -> Result<()> {
    // No constant fields: every record is written in full
    writer.write_u32::<LittleEndian>(0)?;

    for record in records {
        writer.write_u32::<LittleEndian>(record.key.resource_type)?;
        writer.write_u32::<LittleEndian>(record.key.group)?;
        writer.write_u32::<LittleEndian>(record.key.instance_high())?;
        writer.write_u32::<LittleEndian>(record.key.instance_low())?;
        writer.write_u32::<LittleEndian>(record.offset)?;
        writer.write_u32::<LittleEndian>(record.file_size | EXTENDED_COMPRESSION_BIT)?;
        writer.write_u32::<LittleEndian>(record.mem_size)?;
        writer.write_u16::<LittleEndian>(record.compression.code())?;
        writer.write_u16::<LittleEndian>(record.committed)?;
    }

    Ok(())
}
