//! Read-only access to a sectioned FITS file.

use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::error::{FitsError, Result};
use super::header::Header;
use crate::utils::config::ReadConsts;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Backing bytes: decompressed/read into memory, or mapped for large plain files.
enum Source {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Source::Owned(v) => v,
            Source::Mapped(m) => m,
        }
    }
}

struct SectionSpan {
    header: Header,
    data_start: usize,
    data_len: usize,
}

/// One section of an open file: header plus unpadded payload bytes.
#[derive(Clone, Copy)]
pub struct Section<'a> {
    pub index: usize,
    header: &'a Header,
    data: &'a [u8],
}

impl<'a> Section<'a> {
    pub fn header(&self) -> &'a Header {
        self.header
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// An opened FITS file with all section boundaries resolved.
pub struct FitsFile {
    path: PathBuf,
    bytes: Source,
    sections: Vec<SectionSpan>,
}

impl FitsFile {
    /// Open `path`. Gzip content (by magic bytes) is decompressed in memory; plain files above
    /// [`ReadConsts::MMAP_THRESHOLD`] are memory-mapped.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        let mut magic = [0u8; 2];
        let is_gzip = size >= 2 && {
            file.read_exact(&mut magic)?;
            magic == GZIP_MAGIC
        };
        // Reopen so every reader below starts at byte 0.
        let file = File::open(path)?;
        let bytes = if is_gzip {
            let mut out = Vec::with_capacity(size as usize * ReadConsts::GZIP_EXPANSION_HINT);
            MultiGzDecoder::new(std::io::BufReader::new(file)).read_to_end(&mut out)?;
            Source::Owned(out)
        } else if size > ReadConsts::MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file)? };
            Source::Mapped(mmap)
        } else {
            let mut out = Vec::with_capacity(size as usize);
            std::io::BufReader::new(file).read_to_end(&mut out)?;
            Source::Owned(out)
        };
        Self::index(path.to_path_buf(), bytes)
    }

    /// Parse an in-memory (uncompressed) file.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::index(PathBuf::from("<memory>"), Source::Owned(bytes))
    }

    fn index(path: PathBuf, bytes: Source) -> Result<Self> {
        let mut sections = Vec::new();
        let mut offset = 0_usize;
        while offset < bytes.len() {
            let (header, header_len) = Header::parse(&bytes[offset..], offset)?;
            let data_start = offset + header_len;
            let data_len = header.data_len()?;
            let data_end = data_start
                .checked_add(data_len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    FitsError::Truncated(format!(
                        "{}: section {} needs {} payload bytes",
                        path.display(),
                        sections.len(),
                        data_len
                    ))
                })?;
            sections.push(SectionSpan {
                header,
                data_start,
                data_len,
            });
            // Last block padding may be missing; never step past the end.
            offset = (data_start + super::padded_len(data_len))
                .max(data_end)
                .min(bytes.len());
        }
        if sections.is_empty() {
            return Err(FitsError::Empty);
        }
        Ok(FitsFile {
            path,
            bytes,
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of sections, including the primary.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, index: usize) -> Option<Section<'_>> {
        self.sections.get(index).map(|span| Section {
            index,
            header: &span.header,
            data: &self.bytes[span.data_start..span.data_start + span.data_len],
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = Section<'_>> {
        (0..self.sections.len()).filter_map(|i| self.section(i))
    }
}
