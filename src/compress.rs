//! Magic-byte detection and decoding of sync database tarballs.

use std::borrow::Cow;

use crate::{Error, Result};

const MAGIC_GZIP: [u8; 2] = [0x1f, 0x8b];
const MAGIC_BZIP2: [u8; 3] = [0x42, 0x5a, 0x68]; // BZh
const MAGIC_XZ: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]; // 0xfd + 7zXZ + \0
const MAGIC_ZSTD: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const MAGIC_LRZIP: [u8; 4] = [0x4c, 0x52, 0x5a, 0x49]; // LRZI
const MAGIC_LZOP: [u8; 4] = [0x89, 0x4c, 0x5a, 0x4f]; // 0x89 + LZO
const MAGIC_LZW: [u8; 2] = [0x1f, 0x9d];
const MAGIC_LZ4: [u8; 4] = [0x04, 0x22, 0x4d, 0x18];
const MAGIC_LZIP: [u8; 4] = [0x4c, 0x5a, 0x49, 0x50]; // LZIP
const MAGIC_TAR_PREFIX: [u8; 5] = [0x75, 0x73, 0x74, 0x61, 0x72]; // "ustar"
const MAGIC_TAR_SUFFIX_POSIX: [u8; 3] = [0x00, 0x30, 0x30]; // "\0""00"
const MAGIC_TAR_SUFFIX_GNU: [u8; 3] = [0x20, 0x20, 0x00]; // "  \0"

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
    Lrzip,
    Lzop,
    Lzw,
    Lzip,
}

pub(crate) fn is_buffer_tar(buffer: &[u8]) -> bool {
    buffer.len() >= 512 && buffer[257..262] == MAGIC_TAR_PREFIX && (
        buffer[262..265] == MAGIC_TAR_SUFFIX_POSIX ||
        buffer[262..265] == MAGIC_TAR_SUFFIX_GNU)
}

impl Compression {
    /// Sniff the format, `None` is a plain tar. Magic of all compressed
    /// formats are mutually exclusive.
    pub fn from_magic(buffer: &[u8]) -> Option<Self> {
        if is_buffer_tar(buffer) {
            return Some(Self::None)
        }
        if buffer.starts_with(&MAGIC_XZ) {
            return Some(Self::Xz)
        }
        for (magic, compression) in [
            (&MAGIC_ZSTD, Self::Zstd),
            (&MAGIC_LRZIP, Self::Lrzip),
            (&MAGIC_LZOP, Self::Lzop),
            (&MAGIC_LZ4, Self::Lz4),
            (&MAGIC_LZIP, Self::Lzip),
        ] {
            if buffer.starts_with(magic) {
                return Some(compression)
            }
        }
        if buffer.starts_with(&MAGIC_BZIP2) {
            return Some(Self::Bzip2)
        }
        if buffer.starts_with(&MAGIC_GZIP) {
            return Some(Self::Gzip)
        }
        if buffer.starts_with(&MAGIC_LZW) {
            return Some(Self::Lzw)
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
            Self::Lz4 => "lz4",
            Self::Lrzip => "lrzip",
            Self::Lzop => "lzop",
            Self::Lzw => "compress",
            Self::Lzip => "lzip",
        }
    }

    fn unsupported(&self) -> Error {
        log::error!("No decoder available for {} compressed DB, \
            was the feature disabled at build time?", self.name());
        Error::UnsupportedCompression(self.name())
    }

    fn decoding_error<E: std::fmt::Display>(&self, e: E) -> Error {
        log::error!("Failed to decompress {} data: {}", self.name(), e);
        Error::BrokenDB
    }

    /// Decode `buffer` according to this format
    pub fn decompress<'a>(&self, buffer: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let decoded = match self {
            Self::None => return Ok(Cow::Borrowed(buffer)),
            Self::Gzip => self.decompress_gzip(buffer),
            Self::Bzip2 => self.decompress_bzip2(buffer),
            Self::Xz => self.decompress_xz(buffer),
            Self::Zstd => self.decompress_zstd(buffer),
            Self::Lz4 => self.decompress_lz4(buffer),
            Self::Lrzip | Self::Lzop | Self::Lzw | Self::Lzip =>
                Err(self.unsupported()),
        }?;
        log::debug!("Decompressed {} bytes of {} into {} bytes",
            buffer.len(), self.name(), decoded.len());
        Ok(Cow::Owned(decoded))
    }

    #[cfg(feature = "db_gz")]
    fn decompress_gzip(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(
            &mut flate2::read::MultiGzDecoder::new(buffer), &mut decoded)
            .map_err(|e| self.decoding_error(e))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "db_gz"))]
    fn decompress_gzip(&self, _buffer: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }

    #[cfg(feature = "db_bz2")]
    fn decompress_bzip2(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(
            &mut bzip2::read::MultiBzDecoder::new(buffer), &mut decoded)
            .map_err(|e| self.decoding_error(e))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "db_bz2"))]
    fn decompress_bzip2(&self, _buffer: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }

    #[cfg(feature = "db_xz")]
    fn decompress_xz(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let mut input = buffer;
        let mut decoded = Vec::new();
        lzma_rs::xz_decompress(&mut input, &mut decoded)
            .map_err(|e| self.decoding_error(e))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "db_xz"))]
    fn decompress_xz(&self, _buffer: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }

    #[cfg(feature = "db_zst")]
    fn decompress_zstd(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::decode_all(buffer).map_err(|e| self.decoding_error(e))
    }

    #[cfg(not(feature = "db_zst"))]
    fn decompress_zstd(&self, _buffer: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }

    #[cfg(feature = "db_lz4")]
    fn decompress_lz4(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(
            &mut lz4_flex::frame::FrameDecoder::new(buffer), &mut decoded)
            .map_err(|e| self.decoding_error(e))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "db_lz4"))]
    fn decompress_lz4(&self, _buffer: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported())
    }
}
