//! AIFF header: FORM, COMM and the SSND preamble, big-endian.

use super::{ContainerSpec, AIFF_HEADER_LEN};
use crate::error::Result;
use std::io::{Seek, SeekFrom, Write};

pub const FORM_SIZE_OFFSET: u64 = 4;
pub const FRAME_COUNT_OFFSET: u64 = 22;
pub const SAMPLE_RATE_OFFSET: u64 = 28;
pub const SSND_SIZE_OFFSET: u64 = 42;

/// Encode an integer sample rate as an 80-bit IEEE 754 extended float.
pub fn sample_rate_to_extended(rate: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if rate == 0 {
        return out;
    }

    let shift = 31 - rate.leading_zeros();
    let exponent = 16383u16 + shift as u16;
    let mantissa = (rate as u64) << (63 - shift);

    out[0..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..10].copy_from_slice(&mantissa.to_be_bytes());
    out
}

fn form_size(data_len: u32) -> u32 {
    let pad = data_len & 1;
    (AIFF_HEADER_LEN as u32 - 8)
        .saturating_add(data_len)
        .saturating_add(pad)
}

fn frame_count(spec: &ContainerSpec, data_len: u32) -> u32 {
    data_len / spec.block_align().max(1) as u32
}

pub fn write_header<W: Write>(w: &mut W, spec: &ContainerSpec, data_len: u32) -> Result<()> {
    let mut header = [0u8; AIFF_HEADER_LEN as usize];
    header[0..4].copy_from_slice(b"FORM");
    header[4..8].copy_from_slice(&form_size(data_len).to_be_bytes());
    header[8..12].copy_from_slice(b"AIFF");

    header[12..16].copy_from_slice(b"COMM");
    header[16..20].copy_from_slice(&18u32.to_be_bytes());
    header[20..22].copy_from_slice(&spec.channels.to_be_bytes());
    header[22..26].copy_from_slice(&frame_count(spec, data_len).to_be_bytes());
    header[26..28].copy_from_slice(&spec.format.bit_depth.bits().to_be_bytes());
    header[28..38].copy_from_slice(&sample_rate_to_extended(spec.sample_rate));

    header[38..42].copy_from_slice(b"SSND");
    header[42..46].copy_from_slice(&(8u32.saturating_add(data_len)).to_be_bytes());
    // offset and block size stay zero

    w.write_all(&header)?;
    Ok(())
}

/// Patch FORM size, frame count and SSND size, leaving the stream at its end.
pub fn patch_sizes<W: Write + Seek>(w: &mut W, spec: &ContainerSpec, data_len: u32) -> Result<()> {
    w.seek(SeekFrom::Start(FORM_SIZE_OFFSET))?;
    w.write_all(&form_size(data_len).to_be_bytes())?;
    w.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
    w.write_all(&frame_count(spec, data_len).to_be_bytes())?;
    w.seek(SeekFrom::Start(SSND_SIZE_OFFSET))?;
    w.write_all(&(8u32.saturating_add(data_len)).to_be_bytes())?;
    w.seek(SeekFrom::End(0))?;
    Ok(())
}
