//! Chunk record format: framing used both for the persisted chunk log and
//! for delta payloads handed over by the fetcher.
//!
//! Each record is a fixed 28-byte header followed by `length` payload bytes.
//! The header is `#[repr(C, packed)]` with little-endian integers and uses
//! zerocopy derives, so encoding and decoding never touch unsafe code.
//!
//! A stream is a plain concatenation of records. Running out of input exactly
//! on a record boundary is end-of-stream; running out anywhere else is an
//! error.

use std::io::{self, Read, Write};

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::chunk::{ChunkError, ChunkRecord, ChunkType, FULL_HASH_LEN, PREFIX_LEN};

// ── Record Header ─────────────────────────────────────────────────────────────

/// Wire size: 28 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RecordHeader {
    /// Record format version. Currently 0x01.
    pub version: u8,

    /// 0x01 = ADD, 0x02 = SUB.
    pub chunk_type: u8,

    /// Entry width in bytes. Not validated here; classification happens
    /// when the record is merged.
    pub entry_width: u8,

    /// Reserved, must be zero.
    pub flags: u8,

    pub number: U32<LittleEndian>,

    /// Payload length in bytes, not including this header.
    pub length: U32<LittleEndian>,

    /// First 16 bytes of BLAKE3 over type, width, number and payload.
    pub checksum: [u8; 16],
}

assert_eq_size!(RecordHeader, [u8; 28]);

pub const HEADER_LEN: usize = std::mem::size_of::<RecordHeader>();

/// Current record format version.
pub const RECORD_VERSION: u8 = 0x01;

/// Largest payload a single record may carry (16 MiB).
pub const MAX_RECORD_PAYLOAD: usize = 16 * 1024 * 1024;

fn checksum(chunk_type: u8, entry_width: u8, number: u32, payload: &[u8]) -> [u8; 16] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[chunk_type, entry_width]);
    hasher.update(&number.to_le_bytes());
    hasher.update(payload);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
    out
}

impl RecordHeader {
    pub fn for_record(record: &ChunkRecord) -> Self {
        let chunk_type = u8::from(record.chunk_type);
        Self {
            version: RECORD_VERSION,
            chunk_type,
            entry_width: record.entry_width,
            flags: 0,
            number: U32::new(record.number),
            length: U32::new(record.hashes.len() as u32),
            checksum: checksum(chunk_type, record.entry_width, record.number, &record.hashes),
        }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Streams records out one at a time.
pub struct RecordWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write(&mut self, record: &ChunkRecord) -> io::Result<()> {
        if record.hashes.len() > MAX_RECORD_PAYLOAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                CodecError::PayloadTooLarge(record.hashes.len()),
            ));
        }
        let header = RecordHeader::for_record(record);
        self.inner.write_all(header.as_bytes())?;
        self.inner.write_all(&record.hashes)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Encode records into a single buffer.
pub fn encode_all<'a>(records: impl IntoIterator<Item = &'a ChunkRecord>) -> io::Result<Vec<u8>> {
    let mut writer = RecordWriter::new(Vec::new());
    for record in records {
        writer.write(record)?;
    }
    Ok(writer.into_inner())
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Lazy, finite iterator over the records of a stream.
///
/// Yields `Err` at most once: after an error the iterator is exhausted.
pub struct RecordReader<R: Read> {
    inner: R,
    read: usize,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            read: 0,
            done: false,
        }
    }

    /// Number of records successfully decoded so far.
    pub fn records_read(&self) -> usize {
        self.read
    }

    fn read_record(&mut self) -> Result<Option<ChunkRecord>, CodecError> {
        let mut buf = [0u8; HEADER_LEN];
        let filled = read_full(&mut self.inner, &mut buf)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < HEADER_LEN {
            return Err(CodecError::Truncated { index: self.read });
        }
        let header =
            RecordHeader::read_from(&buf[..]).ok_or(CodecError::Truncated { index: self.read })?;

        if header.version != RECORD_VERSION {
            return Err(CodecError::UnknownVersion(header.version));
        }
        if header.flags != 0 {
            return Err(CodecError::ReservedFlagsSet(header.flags));
        }
        let chunk_type = ChunkType::try_from(header.chunk_type)?;
        let number = header.number.get();
        let length = header.length.get() as usize;
        if length > MAX_RECORD_PAYLOAD {
            return Err(CodecError::PayloadTooLarge(length));
        }

        let mut payload = vec![0u8; length];
        if read_full(&mut self.inner, &mut payload)? < length {
            return Err(CodecError::Truncated { index: self.read });
        }

        if checksum(header.chunk_type, header.entry_width, number, &payload) != header.checksum {
            return Err(CodecError::BadChecksum { chunk_type, number });
        }

        let width = header.entry_width as usize;
        if (width == PREFIX_LEN || width == FULL_HASH_LEN) && length % width != 0 {
            return Err(CodecError::Misaligned { len: length, width });
        }

        Ok(Some(ChunkRecord::new(
            chunk_type,
            number,
            header.entry_width,
            payload,
        )))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<ChunkRecord, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => {
                self.read += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("record {index} is truncated")]
    Truncated { index: usize },

    #[error("unknown record version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("reserved flags are non-zero: 0x{0:02x}")]
    ReservedFlagsSet(u8),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("payload length {0} exceeds maximum {}", MAX_RECORD_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("checksum mismatch in {chunk_type} chunk {number}")]
    BadChecksum { chunk_type: ChunkType, number: u32 },

    #[error("{len}-byte payload is not a multiple of entry width {width}")]
    Misaligned { len: usize, width: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
