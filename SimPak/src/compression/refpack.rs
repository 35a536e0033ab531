//! `RefPack` (the game's "internal compression") codec
//!
//! Decoding handles every command form. Encoding writes literal runs only,
//! which any reader accepts.

use crate::error::{Error, Result};

/// Flag in the first header byte: sizes are 4 bytes instead of 3.
const FLAG_LARGE_SIZES: u8 = 0x80;
/// Flag in the first header byte: a compressed size precedes the decompressed size.
const FLAG_COMPRESSED_SIZE: u8 = 0x01;
/// Second header byte.
const SIGNATURE: u8 = 0xFB;
/// First header byte written by the encoder.
const HEADER_FLAGS: u8 = 0x10;
/// Longest literal run a single command can carry.
const MAX_LITERAL_RUN: usize = 112;

fn corrupt(message: impl Into<String>) -> Error {
    Error::RefPackDecompressionFailed {
        message: message.into(),
    }
}

/// Reads bytes from the compressed stream with bounds checks.
struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| corrupt("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| corrupt("literal run past end of input"))?;
        self.pos = end;
        Ok(slice)
    }

    fn size(&mut self, width: usize) -> Result<usize> {
        let mut value = 0usize;
        for _ in 0..width {
            value = (value << 8) | usize::from(self.byte()?);
        }
        Ok(value)
    }
}

/// Decompress `RefPack` data
///
/// # Errors
/// Returns an error if the header is invalid or a command reads past the
/// input or references data before the start of the output.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut input = Input { data, pos: 0 };

    let flags = input.byte()?;
    if input.byte()? != SIGNATURE {
        return Err(corrupt("missing 0xFB signature"));
    }
    let width = if flags & FLAG_LARGE_SIZES == 0 { 3 } else { 4 };
    if flags & FLAG_COMPRESSED_SIZE != 0 {
        input.size(width)?;
    }
    let size = input.size(width)?;

    let mut output = Vec::with_capacity(size);
    loop {
        let b0 = usize::from(input.byte()?);
        let (literal, copy_len, offset, last) = if b0 < 0x80 {
            let b1 = usize::from(input.byte()?);
            (b0 & 0x03, ((b0 & 0x1C) >> 2) + 3, ((b0 & 0x60) << 3) + b1 + 1, false)
        } else if b0 < 0xC0 {
            let b1 = usize::from(input.byte()?);
            let b2 = usize::from(input.byte()?);
            ((b1 >> 6) & 0x03, (b0 & 0x3F) + 4, ((b1 & 0x3F) << 8) + b2 + 1, false)
        } else if b0 < 0xE0 {
            let b1 = usize::from(input.byte()?);
            let b2 = usize::from(input.byte()?);
            let b3 = usize::from(input.byte()?);
            (
                b0 & 0x03,
                ((b0 & 0x0C) << 6) + b3 + 5,
                ((b0 & 0x10) << 12) + (b1 << 8) + b2 + 1,
                false,
            )
        } else if b0 < 0xFC {
            (((b0 & 0x1F) << 2) + 4, 0, 0, false)
        } else {
            (b0 & 0x03, 0, 0, true)
        };

        output.extend_from_slice(input.take(literal)?);

        if copy_len > 0 {
            let start = output
                .len()
                .checked_sub(offset)
                .ok_or_else(|| corrupt("back-reference before start of output"))?;
            // Byte by byte: the source may overlap what is being written.
            for i in 0..copy_len {
                let byte = output[start + i];
                output.push(byte);
            }
        }

        if last || input.pos >= data.len() {
            break;
        }
    }

    if output.len() != size {
        return Err(corrupt(format!(
            "header declares {size} bytes, produced {}",
            output.len()
        )));
    }
    Ok(output)
}

/// Compress data as `RefPack` using literal runs only
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / MAX_LITERAL_RUN + 8);

    let size = data.len();
    if size > 0x00FF_FFFF {
        output.push(HEADER_FLAGS | FLAG_LARGE_SIZES);
        output.push(SIGNATURE);
        output.extend_from_slice(&(size as u32).to_be_bytes());
    } else {
        output.push(HEADER_FLAGS);
        output.push(SIGNATURE);
        output.extend_from_slice(&(size as u32).to_be_bytes()[1..]);
    }

    let mut rest = data;
    while rest.len() >= 4 {
        let run = (rest.len() & !0x03).min(MAX_LITERAL_RUN);
        output.push(0xE0 | ((run / 4 - 1) as u8));
        output.extend_from_slice(&rest[..run]);
        rest = &rest[run..];
    }
    output.push(0xFC | rest.len() as u8);
    output.extend_from_slice(rest);

    output
}
