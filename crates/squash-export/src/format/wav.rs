//! Canonical 44-byte WAV header.
//!
//! Supports 16-bit and 24-bit PCM (format tag 1) and 32-bit float (tag 3).

use super::{ContainerSpec, WAV_HEADER_LEN};
use crate::error::Result;
use std::io::{Seek, SeekFrom, Write};

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Offset of the RIFF chunk size.
pub const RIFF_SIZE_OFFSET: u64 = 4;
/// Offset of the data chunk size.
pub const DATA_SIZE_OFFSET: u64 = 40;

fn riff_size(data_len: u32) -> u32 {
    let pad = data_len & 1;
    (WAV_HEADER_LEN as u32 - 8)
        .saturating_add(data_len)
        .saturating_add(pad)
}

/// Write the header for `data_len` bytes of sample data.
pub fn write_header<W: Write>(w: &mut W, spec: &ContainerSpec, data_len: u32) -> Result<()> {
    let tag = if spec.format.bit_depth.is_float() {
        FORMAT_IEEE_FLOAT
    } else {
        FORMAT_PCM
    };

    let mut header = [0u8; WAV_HEADER_LEN as usize];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size(data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&tag.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&spec.format.bit_depth.bits().to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    w.write_all(&header)?;
    Ok(())
}

/// Patch the RIFF and data sizes in place, leaving the stream at its end.
pub fn patch_sizes<W: Write + Seek>(w: &mut W, data_len: u32) -> Result<()> {
    w.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
    w.write_all(&riff_size(data_len).to_le_bytes())?;
    w.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
    w.write_all(&data_len.to_le_bytes())?;
    w.seek(SeekFrom::End(0))?;
    Ok(())
}
