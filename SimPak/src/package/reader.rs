//! DBPF package reader with progress callbacks and error recovery

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use super::entry::{CompressedBuffer, ResourceEntry};
use super::{
    CompressionType, HEADER_SIZE, INDEX_FLAG_CONSTANT_GROUP, INDEX_FLAG_CONSTANT_INSTANCE_HIGH,
    INDEX_FLAG_CONSTANT_TYPE, IndexRecord, MAGIC, MAJOR_VERSION, MAX_MINOR_VERSION,
    PackageHeader, PackagePhase, PackageProgress, PackageReadOptions, ProgressCallback,
    ResourceKey,
};
use crate::base::Bytes;
use crate::compression;
use crate::error::{Error, Result};
use crate::resources::{RawResource, Resource, decode_resource};

/// Set in a record's file size when compression info follows the sizes
const EXTENDED_COMPRESSION_BIT: u32 = 0x8000_0000;

/// Reader over the bytes of a whole package
pub(crate) struct PackageReader<'a> {
    data: &'a [u8],
}

impl<'a> PackageReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Parse the 96-byte header
    pub(crate) fn read_header(&self) -> Result<PackageHeader> {
        if self.data.len() < HEADER_SIZE {
            return Err(Error::MalformedPackage(format!(
                "expected at least {HEADER_SIZE} header bytes, found {}",
                self.data.len()
            )));
        }

        let mut cursor = Cursor::new(&self.data[..HEADER_SIZE]);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidPackageMagic(magic));
        }

        let major_version = cursor.read_u32::<LittleEndian>()?;
        let minor_version = cursor.read_u32::<LittleEndian>()?;
        if major_version != MAJOR_VERSION || minor_version > MAX_MINOR_VERSION {
            return Err(Error::UnsupportedFormatVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        cursor.set_position(36);
        let index_count = cursor.read_u32::<LittleEndian>()?;
        let legacy_index_offset = cursor.read_u32::<LittleEndian>()?;
        let index_size = cursor.read_u32::<LittleEndian>()?;

        cursor.set_position(64);
        let mut index_offset = cursor.read_u64::<LittleEndian>()?;
        if index_offset == 0 {
            index_offset = u64::from(legacy_index_offset);
        }

        Ok(PackageHeader {
            major_version,
            minor_version,
            index_count,
            index_size,
            index_offset,
        })
    }

    /// Parse the index table the header points at
    pub(crate) fn read_index(&self, header: &PackageHeader) -> Result<Vec<IndexRecord>> {
        if header.index_count == 0 {
            return Ok(Vec::new());
        }

        let index = self.slice(header.index_offset, u64::from(header.index_size), "index table")?;
        let mut cursor = Cursor::new(index);

        let flags = index_u32(&mut cursor)?;
        let constant_type = read_constant(&mut cursor, flags, INDEX_FLAG_CONSTANT_TYPE)?;
        let constant_group = read_constant(&mut cursor, flags, INDEX_FLAG_CONSTANT_GROUP)?;
        let constant_instance_high =
            read_constant(&mut cursor, flags, INDEX_FLAG_CONSTANT_INSTANCE_HIGH)?;

        let mut records = Vec::with_capacity((header.index_count as usize).min(index.len() / 16));

        for _ in 0..header.index_count {
            let resource_type = constant_type.map_or_else(|| index_u32(&mut cursor), Ok)?;
            let group = constant_group.map_or_else(|| index_u32(&mut cursor), Ok)?;
            let instance_high = constant_instance_high.map_or_else(|| index_u32(&mut cursor), Ok)?;
            let instance_low = index_u32(&mut cursor)?;

            let offset = index_u32(&mut cursor)?;
            let raw_file_size = index_u32(&mut cursor)?;
            let mem_size = index_u32(&mut cursor)?;

            let (compression, committed) = if raw_file_size & EXTENDED_COMPRESSION_BIT == 0 {
                (CompressionType::Uncompressed, 1)
            } else {
                let code = index_u16(&mut cursor)?;
                let committed = index_u16(&mut cursor)?;
                (CompressionType::from_code(code)?, committed)
            };

            let instance = (u64::from(instance_high) << 32) | u64::from(instance_low);
            records.push(IndexRecord {
                key: ResourceKey::new(resource_type, group, instance),
                offset,
                file_size: raw_file_size & !EXTENDED_COMPRESSION_BIT,
                mem_size,
                compression,
                committed,
            });
        }

        Ok(records)
    }

    /// The stored (still compressed) bytes of one record
    pub(crate) fn payload(&self, record: &IndexRecord) -> Result<&'a [u8]> {
        self.slice(u64::from(record.offset), u64::from(record.file_size), "resource payload")
    }

    /// Read header, index, and every entry that passes the options
    pub(crate) fn read_entries(
        &self,
        options: &PackageReadOptions,
        progress: ProgressCallback,
    ) -> Result<LoadedEntries> {
        progress(&PackageProgress::new(PackagePhase::ReadingHeader, 0, 1));
        let header = self.read_header()?;

        progress(&PackageProgress::new(PackagePhase::ReadingIndex, 0, 1));
        let records = self.read_index(&header)?;

        let selected: Vec<&IndexRecord> = records
            .iter()
            .filter(|record| {
                options.keep_deleted_records || record.compression != CompressionType::DeletedRecord
            })
            .filter(|record| options.accepts(&record.key))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        let total = selected.len();
        let mut entries = Vec::with_capacity(total);
        for (i, record) in selected.into_iter().enumerate() {
            progress(&PackageProgress::with_key(
                PackagePhase::LoadingResources,
                i + 1,
                total,
                record.key,
            ));

            let payload = self.payload(record)?;
            let value = self.load_resource(record, payload, options)?;
            let buffer = CompressedBuffer {
                data: Bytes::from(payload),
                compression: record.compression,
                mem_size: record.mem_size,
            };
            entries.push(ResourceEntry::from_stored(record.key, value, buffer));
        }

        progress(&PackageProgress::new(PackagePhase::Complete, total, total));
        debug!(
            version = %format_args!("{}.{}", header.major_version, header.minor_version),
            records = records.len(),
            loaded = entries.len(),
            bytes = self.data.len(),
            "read package"
        );

        Ok(LoadedEntries {
            complete: entries.len() == records.len(),
            entries,
        })
    }

    /// Decompress and decode one payload, falling back to a raw resource in
    /// recovery mode
    fn load_resource(
        &self,
        record: &IndexRecord,
        payload: &[u8],
        options: &PackageReadOptions,
    ) -> Result<Box<dyn Resource>> {
        let decompressed =
            match compression::decompress(payload, record.compression, record.mem_size as usize) {
                Ok(data) => data,
                Err(e) if options.recovery_mode => {
                    warn!(key = %record.key, error = %e, "loading undecompressable resource as raw");
                    return Ok(Box::new(RawResource::with_reason(payload, e.to_string())));
                }
                Err(e) => return Err(e),
            };

        if options.load_raw || record.compression == CompressionType::DeletedRecord {
            return Ok(Box::new(RawResource::from_bytes(&decompressed)));
        }

        let decoded = match options.decoders.get(&record.key.resource_type) {
            Some(decoder) => decoder(&decompressed),
            None => decode_resource(record.key.resource_type, &decompressed),
        };

        match decoded {
            Ok(resource) => Ok(resource),
            Err(e) if options.recovery_mode => {
                warn!(key = %record.key, error = %e, "loading undecodable resource as raw");
                Ok(Box::new(RawResource::with_reason(&decompressed, e.to_string())))
            }
            Err(e) => Err(Error::ResourceDecodeFailed {
                key: record.key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn slice(&self, offset: u64, size: u64, what: &str) -> Result<&'a [u8]> {
        let end = offset.checked_add(size);
        match end {
            Some(end) if end <= self.data.len() as u64 => {
                Ok(&self.data[offset as usize..end as usize])
            }
            _ => Err(Error::MalformedPackage(format!(
                "{what} at {offset}+{size} extends past the end of the package ({} bytes)",
                self.data.len()
            ))),
        }
    }
}

/// Entries read from a package
pub(crate) struct LoadedEntries {
    pub entries: Vec<ResourceEntry>,
    /// Whether every index record became an entry
    pub complete: bool,
}

fn read_constant(cursor: &mut Cursor<&[u8]>, flags: u32, flag: u32) -> Result<Option<u32>> {
    if flags & flag == 0 {
        Ok(None)
    } else {
        index_u32(cursor).map(Some)
    }
}

/// Index fields past the end of the table mean the header lied about it
fn truncated_index(cursor: &Cursor<&[u8]>) -> Error {
    Error::MalformedPackage(format!(
        "index table truncated: {} bytes hold fewer records than declared",
        cursor.get_ref().len()
    ))
}

fn index_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated_index(cursor))
}

fn index_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| truncated_index(cursor))
}
