//! Minimal FITS access: sectioned files (header + payload per section), read verbatim and
//! written back verbatim. Only what filtering needs; no image or column decoding beyond
//! integer identifiers.

pub mod error;
pub mod file;
pub mod header;
pub mod table;
pub mod writer;

pub use error::{FitsError, Result};
pub use file::{FitsFile, Section};
pub use header::{Card, Header, Value};
pub use table::{Column, ColumnKind, RowTable};
pub use writer::{FitsWriter, wants_gzip};

/// Bytes in one header card.
pub const CARD_LEN: usize = 80;
/// Headers and payloads are padded to a multiple of this.
pub const BLOCK_LEN: usize = 2880;

/// Round `n` up to the next block boundary.
pub fn padded_len(n: usize) -> usize {
    n.div_ceil(BLOCK_LEN) * BLOCK_LEN
}
