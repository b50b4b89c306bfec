//! Scratch storage for incoming request bytes.
//!
//! Requests are buffered in memory until they cross a size threshold, after which
//! everything is moved to an anonymous temporary file. The file is unlinked by the
//! OS as soon as the last handle drops, so nothing outlives the request.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Default number of bytes held in memory before spilling to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 1024 * 1024;

/// A readable, seekable store of request bytes.
#[derive(Debug)]
pub enum Spool {
    Memory(Cursor<Vec<u8>>),
    File(File),
}

impl Spool {
    /// Total number of bytes in the spool, independent of the read position.
    pub fn len(&self) -> io::Result<u64> {
        match self {
            Spool::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            Spool::File(file) => Ok(file.metadata()?.len()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, Spool::File(_))
    }
}

impl From<Vec<u8>> for Spool {
    fn from(bytes: Vec<u8>) -> Self {
        Spool::Memory(Cursor::new(bytes))
    }
}

impl From<&[u8]> for Spool {
    fn from(bytes: &[u8]) -> Self {
        Spool::from(bytes.to_vec())
    }
}

impl Read for Spool {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Spool::Memory(cursor) => cursor.read(buf),
            Spool::File(file) => file.read(buf),
        }
    }
}

impl Seek for Spool {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Spool::Memory(cursor) => cursor.seek(pos),
            Spool::File(file) => file.seek(pos),
        }
    }
}

/// Growing sink the connection appends socket reads to.
#[derive(Debug)]
pub struct RequestBuffer {
    spool: Spool,
    len: u64,
    spill_threshold: usize,
}

impl RequestBuffer {
    pub fn new(spill_threshold: usize) -> Self {
        Self {
            spool: Spool::Memory(Cursor::new(Vec::new())),
            len: 0,
            spill_threshold,
        }
    }

    /// Append a chunk, spilling to a temporary file once the threshold is crossed.
    pub fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        if let Spool::Memory(cursor) = &mut self.spool {
            if cursor.get_ref().len() + chunk.len() > self.spill_threshold {
                let mut file = tempfile::tempfile()?;
                file.write_all(cursor.get_ref())?;
                tracing::debug!(
                    buffered = cursor.get_ref().len(),
                    threshold = self.spill_threshold,
                    "Request buffer spilled to temporary file"
                );
                self.spool = Spool::File(file);
            }
        }

        match &mut self.spool {
            Spool::Memory(cursor) => cursor.get_mut().extend_from_slice(chunk),
            Spool::File(file) => file.write_all(chunk)?,
        }
        self.len += chunk.len() as u64;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        self.spool.is_spilled()
    }

    /// Finish buffering and hand back the spool rewound to its first byte.
    pub fn into_spool(mut self) -> io::Result<Spool> {
        if let Spool::File(file) = &mut self.spool {
            file.flush()?;
        }
        self.spool.seek(SeekFrom::Start(0))?;
        Ok(self.spool)
    }
}
