//! Sequential FITS writer: empty primary section, then appended sections.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::error::Result;
use super::header::Header;
use super::padded_len;

/// True when a file named like `path` is expected to be gzip-compressed.
pub fn wants_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Writes a new file, truncating any existing one. The file handle is released on drop, so an
/// early return still closes it; only [`FitsWriter::finish`] guarantees a complete file.
pub struct FitsWriter {
    sink: Sink,
    sections: usize,
}

impl FitsWriter {
    /// Create `path` and write the empty primary section.
    pub fn create(path: &Path, gzip: bool) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        let sink = if gzip {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        };
        let mut writer = FitsWriter { sink, sections: 0 };
        writer.sink.write_all(&Header::empty_primary().to_bytes())?;
        Ok(writer)
    }

    /// Append an extension section with `header` and `data` copied verbatim.
    pub fn write_section(&mut self, header: &Header, data: &[u8]) -> Result<()> {
        self.sink.write_all(&header.to_bytes())?;
        self.sink.write_all(data)?;
        let pad = padded_len(data.len()) - data.len();
        if pad > 0 {
            // ASCII tables pad with blanks, everything else with zeros.
            let fill = if header.xtension().as_deref() == Some("TABLE") {
                b' '
            } else {
                0
            };
            self.sink.write_all(&vec![fill; pad])?;
        }
        self.sections += 1;
        Ok(())
    }

    /// Flush everything (and the gzip trailer) and close the file.
    pub fn finish(self) -> Result<usize> {
        match self.sink {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Gzip(gz) => gz.finish()?.flush()?,
        }
        Ok(self.sections)
    }
}
