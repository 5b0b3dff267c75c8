//! Container writers and sample quantisation.
//!
//! Headers are written up front with zero sizes and patched in
//! [`ContainerWriter::finalize`] once the data length is known.

#[cfg(feature = "aiff")]
pub mod aiff;
pub mod wav;

use crate::error::{ExportError, Result};
use crate::options::{AudioFormat, BitDepth, Container};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// WAV header size.
pub const WAV_HEADER_LEN: u64 = 44;
/// AIFF header size (FORM + COMM + SSND preamble).
pub const AIFF_HEADER_LEN: u64 = 54;

/// Byte order of encoded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn for_container(container: Container) -> Self {
        match container {
            Container::Aiff => Endian::Big,
            Container::Wav | Container::Raw => Endian::Little,
        }
    }
}

/// Everything a header needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSpec {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
}

impl ContainerSpec {
    pub fn block_align(&self) -> u16 {
        self.channels * self.format.bit_depth.bytes() as u16
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    pub fn header_len(&self) -> u64 {
        self.format.container.header_len()
    }
}

/// 16-bit quantiser with symmetric full scale.
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// 24-bit quantiser with symmetric full scale.
#[inline]
pub fn float_to_i24(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * 8_388_607.0).round() as i32
}

/// Quantise interleaved samples into `out`, replacing its contents.
///
/// `out` keeps its capacity, so a buffer reserved up front never reallocates.
pub fn encode_samples(samples: &[f32], bit_depth: BitDepth, endian: Endian, out: &mut Vec<u8>) {
    out.clear();
    match (bit_depth, endian) {
        (BitDepth::Int16, Endian::Little) => {
            for &s in samples {
                out.extend_from_slice(&float_to_i16(s).to_le_bytes());
            }
        }
        (BitDepth::Int16, Endian::Big) => {
            for &s in samples {
                out.extend_from_slice(&float_to_i16(s).to_be_bytes());
            }
        }
        (BitDepth::Int24, Endian::Little) => {
            for &s in samples {
                let b = float_to_i24(s).to_le_bytes();
                out.extend_from_slice(&b[..3]);
            }
        }
        (BitDepth::Int24, Endian::Big) => {
            for &s in samples {
                let b = float_to_i24(s).to_be_bytes();
                out.extend_from_slice(&b[1..]);
            }
        }
        (BitDepth::Float32, Endian::Little) => {
            for &s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        (BitDepth::Float32, Endian::Big) => {
            for &s in samples {
                out.extend_from_slice(&s.to_be_bytes());
            }
        }
    }
}

/// Streaming writer for one container file.
pub struct ContainerWriter<W: Write + Seek> {
    inner: W,
    spec: ContainerSpec,
    data_bytes: u64,
}

impl ContainerWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write a placeholder header.
    pub fn create(path: impl AsRef<Path>, spec: ContainerSpec) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), spec)
    }
}

impl<W: Write + Seek> ContainerWriter<W> {
    pub fn new(mut inner: W, spec: ContainerSpec) -> Result<Self> {
        spec.format.validate()?;
        if spec.channels == 0 {
            return Err(ExportError::InvalidOptions("zero channels".into()));
        }

        match spec.format.container {
            Container::Wav => wav::write_header(&mut inner, &spec, 0)?,
            #[cfg(feature = "aiff")]
            Container::Aiff => aiff::write_header(&mut inner, &spec, 0)?,
            #[cfg(not(feature = "aiff"))]
            Container::Aiff => {
                return Err(ExportError::UnsupportedFormat(
                    "AIFF support not enabled".into(),
                ))
            }
            Container::Raw => {}
        }

        Ok(Self {
            inner,
            spec,
            data_bytes: 0,
        })
    }

    /// Append encoded sample bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let limit = u32::MAX as u64 - self.spec.header_len();
        if self.spec.format.container != Container::Raw
            && self.data_bytes + bytes.len() as u64 > limit
        {
            return Err(ExportError::InvalidData(
                "data exceeds the 4 GiB container limit".into(),
            ));
        }
        self.inner.write_all(bytes)?;
        self.data_bytes += bytes.len() as u64;
        Ok(())
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn frames_written(&self) -> u64 {
        self.data_bytes / self.spec.block_align() as u64
    }

    /// Header plus data plus chunk padding, as it will be after finalisation.
    pub fn total_bytes(&self) -> u64 {
        self.spec.header_len() + self.data_bytes + self.pad_len()
    }

    fn pad_len(&self) -> u64 {
        match self.spec.format.container {
            Container::Raw => 0,
            _ => self.data_bytes & 1,
        }
    }

    /// Pad, patch sizes and flush. Returns the underlying writer.
    pub fn finalize(mut self) -> Result<W> {
        if self.pad_len() == 1 {
            self.inner.write_all(&[0])?;
        }
        self.inner.flush()?;

        let data_len = self.data_bytes as u32;
        match self.spec.format.container {
            Container::Wav => wav::patch_sizes(&mut self.inner, data_len)?,
            #[cfg(feature = "aiff")]
            Container::Aiff => aiff::patch_sizes(&mut self.inner, &self.spec, data_len)?,
            #[cfg(not(feature = "aiff"))]
            Container::Aiff => {}
            Container::Raw => {}
        }

        self.inner.flush()?;
        log::debug!(
            "finalized {:?} container: {} data bytes",
            self.spec.format.container,
            self.data_bytes
        );
        Ok(self.inner)
    }

    /// Give up on the file without patching the header.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_i16_quantiser() {
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(1.0), 32767);
        assert_eq!(float_to_i16(-1.0), -32767);
        assert_eq!(float_to_i16(2.0), 32767);
    }

    #[test]
    fn test_i24_packing() {
        let mut out = Vec::new();
        encode_samples(&[1.0, -1.0], BitDepth::Int24, Endian::Little, &mut out);
        assert_eq!(out, [0xFF, 0xFF, 0x7F, 0x01, 0x00, 0x80]);

        encode_samples(&[1.0], BitDepth::Int24, Endian::Big, &mut out);
        assert_eq!(out, [0x7F, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_reuses_capacity() {
        let mut out = Vec::with_capacity(64);
        let ptr = out.as_ptr();
        encode_samples(&[0.5; 16], BitDepth::Int16, Endian::Little, &mut out);
        encode_samples(&[0.25; 16], BitDepth::Float32, Endian::Little, &mut out);
        assert_eq!(out.len(), 64);
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn test_raw_has_no_header() {
        let spec = ContainerSpec {
            format: AudioFormat::raw(BitDepth::Int16),
            sample_rate: 48000,
            channels: 1,
        };
        let mut writer = ContainerWriter::new(Cursor::new(Vec::new()), spec).unwrap();
        writer.write_bytes(&[1, 2, 3, 4]).unwrap();
        assert_eq!(writer.frames_written(), 2);
        let bytes = writer.finalize().unwrap().into_inner();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_create_pads_odd_wav_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.wav");
        let spec = ContainerSpec {
            format: AudioFormat::wav(BitDepth::Int24),
            sample_rate: 44100,
            channels: 1,
        };
        let mut writer = ContainerWriter::create(&path, spec).unwrap();
        writer.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(writer.total_bytes(), WAV_HEADER_LEN + 4);
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, WAV_HEADER_LEN + 4);
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 3);
        assert_eq!(bytes[bytes.len() - 1], 0);
    }
}
