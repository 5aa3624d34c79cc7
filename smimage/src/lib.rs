//! The on-disk bytecode image format shared by the assembler, the VM and
//! the disassembler: a 4-byte header, a body of instructions and inline
//! literals, and a trailing checksum byte.

use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const MAGIC: &[u8; 2] = b"SM";
pub const VERSION: &[u8; 2] = b"11";
pub const HEADER_LEN: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("file is too short to hold a header and checksum")]
    Truncated,
    #[error("not a stack machine binary (missing 'SM' magic)")]
    BadMagic,
    #[error("stack machine binary is of an unsupported version")]
    BadVersion,
    #[error("bad checksum: expected {expected}, found {found}")]
    BadChecksum { expected: u8, found: u8 },
    #[error("image of {len} bytes exceeds the maximum of {max}")]
    Oversized { len: usize, max: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Maximum total image length (header + body + checksum), per spec.
pub const MAX_IMAGE_LEN: usize = 65535;

pub type Result<T> = std::result::Result<T, Error>;

/// A parsed or in-progress bytecode image. `body` holds everything after
/// the 4-byte header and before the trailing checksum byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    body: Vec<u8>,
}

impl Image {
    pub fn new() -> Image {
        Image { body: Vec::new() }
    }

    pub fn from_body(body: Vec<u8>) -> Image {
        Image { body }
    }

    pub fn body(&self) -> &[u8] {
        &self.body[..]
    }

    pub fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub fn push(&mut self, byte: u8) {
        self.body.push(byte);
    }

    /// Appends `end_marker` to the body if it isn't already the last byte.
    /// The assembler calls this with the bytecode for its `end` opcode
    /// before finalizing; the image format itself doesn't know opcode
    /// meanings.
    pub fn ensure_trailer(&mut self, end_marker: u8) {
        if self.body.last() != Some(&end_marker) {
            self.body.push(end_marker);
        }
    }

    fn checksum(header_and_body: &[u8]) -> u8 {
        header_and_body
            .iter()
            .fold(0u32, |acc, &b| acc + b as u32) as u8
    }

    /// Header followed by body, without the trailing checksum. Jump and
    /// call targets are absolute offsets into exactly this buffer, since
    /// that's what the assembler counted against while emitting them.
    pub fn addressable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(VERSION);
        out.extend_from_slice(&self.body);
        out
    }

    /// Serializes header + body + checksum into a single byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = HEADER_LEN + self.body.len() + 1;
        if len > MAX_IMAGE_LEN {
            return Err(Error::Oversized { len, max: MAX_IMAGE_LEN });
        }
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(VERSION);
        out.extend_from_slice(&self.body);
        let csum = Self::checksum(&out);
        out.push(csum);
        Ok(out)
    }

    pub fn parse(bytes: &[u8]) -> Result<Image> {
        if bytes.len() > MAX_IMAGE_LEN {
            return Err(Error::Oversized { len: bytes.len(), max: MAX_IMAGE_LEN });
        }
        if bytes.len() < HEADER_LEN + 1 {
            return Err(Error::Truncated);
        }
        if &bytes[0..2] != MAGIC {
            return Err(Error::BadMagic);
        }
        if &bytes[2..4] != VERSION {
            return Err(Error::BadVersion);
        }
        let (payload, &[found]) = bytes.split_at(bytes.len() - 1) else {
            return Err(Error::Truncated);
        };
        let expected = Self::checksum(payload);
        if expected != found {
            return Err(Error::BadChecksum { expected, found });
        }
        Ok(Image::from_body(payload[HEADER_LEN..].to_vec()))
    }
}

impl Default for Image {
    fn default() -> Image {
        Image::new()
    }
}

pub fn read<R: Read>(reader: &mut R) -> Result<Image> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Image::parse(&bytes)
}

pub fn write<W: Write>(writer: &mut W, image: &Image) -> Result<()> {
    writer.write_all(&image.to_bytes()?)?;
    Ok(())
}

pub trait ReadImageExt: Read + Sized {
    fn read_image(&mut self) -> Result<Image> {
        read(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub trait WriteImageExt: Write + Sized {
    fn write_image(&mut self, image: &Image) -> Result<()> {
        write(self, image)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Image> {
    BufReader::new(File::open(path)?).read_image()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> Result<()> {
    BufWriter::new(File::create(path)?).write_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut image = Image::new();
        image.push(60);
        image.ensure_trailer(2);
        let bytes = image.to_bytes().unwrap();
        let back = Image::parse(&bytes).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn ensure_trailer_is_idempotent() {
        let mut image = Image::new();
        image.push(2);
        image.ensure_trailer(2);
        assert_eq!(image.body(), &[2]);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![b'X', b'X', b'1', b'1', 0];
        assert!(matches!(Image::parse(&bytes), Err(Error::BadMagic)));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(b"99");
        bytes.push(0);
        assert!(matches!(Image::parse(&bytes), Err(Error::BadVersion)));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut image = Image::new();
        image.push(1);
        let mut bytes = image.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] = bytes[last].wrapping_add(1);
        assert!(matches!(Image::parse(&bytes), Err(Error::BadChecksum { .. })));
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(Image::parse(&[b'S']), Err(Error::Truncated)));
    }

    #[test]
    fn rejects_oversized_image() {
        let image = Image::from_body(vec![0u8; MAX_IMAGE_LEN]);
        assert!(matches!(
            image.to_bytes(),
            Err(Error::Oversized { .. })
        ));
    }

    #[test]
    fn round_trips_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog01.smb");

        let mut image = Image::new();
        image.push(73);
        image.push(5);
        image.ensure_trailer(2);
        write_file(&path, &image).unwrap();

        let back = read_file(&path).unwrap();
        assert_eq!(back, image);
    }
}
