//! Binary table sections (`XTENSION = 'BINTABLE'`): column layout and row-level filtering.

use std::path::Path;

use super::error::{FitsError, Result};
use super::file::Section;
use super::header::{Header, Value};
use super::writer::{FitsWriter, wants_gzip};

/// Storage type from the `TFORMn` code letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Logical,
    Bit,
    Byte,
    I16,
    I32,
    I64,
    F32,
    F64,
    Complex32,
    Complex64,
    Char,
    /// Variable-length array descriptor, 32-bit (`P`) or 64-bit (`Q`).
    Descriptor32,
    Descriptor64,
}

impl ColumnKind {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'L' => ColumnKind::Logical,
            'X' => ColumnKind::Bit,
            'B' => ColumnKind::Byte,
            'I' => ColumnKind::I16,
            'J' => ColumnKind::I32,
            'K' => ColumnKind::I64,
            'E' => ColumnKind::F32,
            'D' => ColumnKind::F64,
            'C' => ColumnKind::Complex32,
            'M' => ColumnKind::Complex64,
            'A' => ColumnKind::Char,
            'P' => ColumnKind::Descriptor32,
            'Q' => ColumnKind::Descriptor64,
            _ => return None,
        })
    }

    fn width(self, repeat: usize) -> usize {
        match self {
            ColumnKind::Bit => repeat.div_ceil(8),
            ColumnKind::Logical | ColumnKind::Byte | ColumnKind::Char => repeat,
            ColumnKind::I16 => repeat.saturating_mul(2),
            ColumnKind::I32 | ColumnKind::F32 => repeat.saturating_mul(4),
            ColumnKind::I64
            | ColumnKind::F64
            | ColumnKind::Complex32
            | ColumnKind::Descriptor32 => repeat.saturating_mul(8),
            ColumnKind::Complex64 | ColumnKind::Descriptor64 => repeat.saturating_mul(16),
        }
    }
}

/// One table column and its byte range within a row.
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub format: String,
    pub kind: ColumnKind,
    pub repeat: usize,
    pub offset: usize,
    pub width: usize,
    /// `TSCALn`, 1 when absent.
    pub scale: f64,
    /// `TZEROn`, 0 when absent.
    pub zero: f64,
}

impl Column {
    fn parse_format(tform: &str) -> Result<(usize, ColumnKind)> {
        let tform = tform.trim();
        let digits = tform.chars().take_while(char::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            tform[..digits]
                .parse::<usize>()
                .map_err(|_| FitsError::UnsupportedFormat(tform.to_string()))?
        };
        let kind = tform[digits..]
            .chars()
            .next()
            .and_then(|c| ColumnKind::from_code(c.to_ascii_uppercase()))
            .ok_or_else(|| FitsError::UnsupportedFormat(tform.to_string()))?;
        Ok((repeat, kind))
    }

    /// First element of this column in `row` as an integer, with `TSCALn`/`TZEROn` applied.
    /// Floats count when integral; values outside the `i64` range give None.
    pub fn read_i64(&self, row: &[u8]) -> Option<i64> {
        if self.repeat == 0 {
            return None;
        }
        let cell = row.get(self.offset..self.offset + self.width)?;
        let raw = match self.kind {
            ColumnKind::Byte => i64::from(cell[0]),
            ColumnKind::I16 => i64::from(i16::from_be_bytes(cell[..2].try_into().ok()?)),
            ColumnKind::I32 => i64::from(i32::from_be_bytes(cell[..4].try_into().ok()?)),
            ColumnKind::I64 => i64::from_be_bytes(cell[..8].try_into().ok()?),
            ColumnKind::F32 => {
                let f = f64::from(f32::from_be_bytes(cell[..4].try_into().ok()?));
                return Value::Float(f * self.scale + self.zero).as_i64();
            }
            ColumnKind::F64 => {
                let f = f64::from_be_bytes(cell[..8].try_into().ok()?);
                return Value::Float(f * self.scale + self.zero).as_i64();
            }
            _ => return None,
        };
        self.scaled_integer(raw)
    }

    fn scaled_integer(&self, raw: i64) -> Option<i64> {
        if self.scale == 1.0 && self.zero == 0.0 {
            return Some(raw);
        }
        // Integral offsets such as 2^63 (unsigned 64-bit columns) are exact in i128.
        if self.scale == 1.0 && self.zero.fract() == 0.0 && self.zero.abs() <= 2f64.powi(64) {
            return i64::try_from(i128::from(raw) + self.zero as i128).ok();
        }
        Value::Float(raw as f64 * self.scale + self.zero).as_i64()
    }
}

fn table_dim(header: &Header, keyword: &str) -> Result<usize> {
    let v = header.get_i64(keyword)?;
    usize::try_from(v).map_err(|_| FitsError::InvalidKeyword {
        key: keyword.to_string(),
        value: v.to_string(),
    })
}

fn optional_f64(header: &Header, keyword: &str, default: f64) -> Result<f64> {
    if header.contains(keyword) {
        header.get_f64(keyword)
    } else {
        Ok(default)
    }
}

/// A binary table held in memory: header, column layout, fixed-size rows and the
/// supplemental (heap) area that follows them.
#[derive(Clone, Debug)]
pub struct RowTable {
    header: Header,
    columns: Vec<Column>,
    row_len: usize,
    nrows: usize,
    rows: Vec<u8>,
    heap: Vec<u8>,
}

impl RowTable {
    /// Load the table stored in `section`.
    pub fn from_section(section: Section<'_>) -> Result<Self> {
        let header = section.header();
        if header.xtension().as_deref() != Some("BINTABLE") {
            return Err(FitsError::NotBinaryTable(section.index));
        }
        let row_len = table_dim(header, "NAXIS1")?;
        let nrows = table_dim(header, "NAXIS2")?;
        let tfields = header.get_i64("TFIELDS")?;

        let mut columns = Vec::new();
        let mut offset = 0;
        for n in 1..=tfields {
            let format = header
                .get_str(&format!("TFORM{n}"))
                .ok_or_else(|| FitsError::MissingKeyword(format!("TFORM{n}")))?;
            let (repeat, kind) = Column::parse_format(&format)?;
            let width = kind.width(repeat);
            let scale = optional_f64(header, &format!("TSCAL{n}"), 1.0)?;
            let zero = optional_f64(header, &format!("TZERO{n}"), 0.0)?;
            columns.push(Column {
                name: header.get_str(&format!("TTYPE{n}")).unwrap_or_default(),
                format,
                kind,
                repeat,
                offset,
                width,
                scale,
                zero,
            });
            offset = offset
                .checked_add(width)
                .ok_or_else(|| FitsError::UnsupportedFormat(format!("TFORM{n}")))?;
        }
        if offset > row_len {
            return Err(FitsError::InvalidKeyword {
                key: "NAXIS1".to_string(),
                value: format!("{row_len} (columns need {offset})"),
            });
        }

        let data = section.data();
        let main_len = row_len
            .checked_mul(nrows)
            .ok_or_else(|| FitsError::InvalidKeyword {
                key: "NAXIS2".to_string(),
                value: format!("{nrows} rows of {row_len} bytes overflows"),
            })?;
        if data.len() < main_len {
            return Err(FitsError::Truncated(format!(
                "table in section {} has {} of {} row bytes",
                section.index,
                data.len(),
                main_len
            )));
        }
        Ok(RowTable {
            header: header.clone(),
            columns,
            row_len,
            nrows,
            rows: data[..main_len].to_vec(),
            heap: data[main_len..].to_vec(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column by `TTYPEn` name, case-insensitive.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.nrows
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[u8]> {
        (index < self.nrows).then(|| &self.rows[index * self.row_len..(index + 1) * self.row_len])
    }

    /// Integer value of `column` in row `index`.
    pub fn read_i64(&self, index: usize, column: &Column) -> Result<i64> {
        self.row(index)
            .and_then(|row| column.read_i64(row))
            .ok_or_else(|| FitsError::InvalidKeyword {
                key: column.name.clone(),
                value: format!("row {index} ({})", column.format),
            })
    }

    /// Keep rows whose `mask` entry is true, in their original order. Columns and the heap are
    /// carried over unchanged.
    pub fn retain_mask(&self, mask: &[bool]) -> RowTable {
        let kept: Vec<&[u8]> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .filter_map(|(index, _)| self.row(index))
            .collect();
        let nrows = kept.len();
        let rows = kept.concat();
        let mut header = self.header.clone();
        header.set("NAXIS2", Value::Integer(nrows as i64));
        if let Ok(theap) = header.get_i64("THEAP") {
            let gap = theap - (self.row_len * self.nrows) as i64;
            header.set("THEAP", Value::Integer((self.row_len * nrows) as i64 + gap));
        }
        RowTable {
            header,
            columns: self.columns.clone(),
            row_len: self.row_len,
            nrows,
            rows,
            heap: self.heap.clone(),
        }
    }

    /// Write this table as the only extension of a new file at `path` (gzip when named `.gz`).
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = FitsWriter::create(path, wants_gzip(path))?;
        let mut data = Vec::with_capacity(self.rows.len() + self.heap.len());
        data.extend_from_slice(&self.rows);
        data.extend_from_slice(&self.heap);
        writer.write_section(&self.header, &data)?;
        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(Column::parse_format("K").unwrap(), (1, ColumnKind::I64));
        assert_eq!(Column::parse_format("1K").unwrap(), (1, ColumnKind::I64));
        assert_eq!(Column::parse_format("20A").unwrap(), (20, ColumnKind::Char));
        assert_eq!(Column::parse_format("1PE(100)").unwrap(), (1, ColumnKind::Descriptor32));
        assert!(Column::parse_format("9Z").is_err());
    }

    #[test]
    fn test_widths() {
        assert_eq!(ColumnKind::Bit.width(9), 2);
        assert_eq!(ColumnKind::F64.width(3), 24);
        assert_eq!(ColumnKind::Descriptor64.width(1), 16);
        assert_eq!(ColumnKind::F64.width(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_read_i64_kinds() {
        let col = |kind, width| Column {
            name: "TARGETID".into(),
            format: String::new(),
            kind,
            repeat: 1,
            offset: 0,
            width,
            scale: 1.0,
            zero: 0.0,
        };
        assert_eq!(col(ColumnKind::I64, 8).read_i64(&(-7_i64).to_be_bytes()), Some(-7));
        assert_eq!(col(ColumnKind::I32, 4).read_i64(&70_000_i32.to_be_bytes()), Some(70_000));
        assert_eq!(col(ColumnKind::F64, 8).read_i64(&20.0_f64.to_be_bytes()), Some(20));
        assert_eq!(col(ColumnKind::F64, 8).read_i64(&20.5_f64.to_be_bytes()), None);
        assert_eq!(col(ColumnKind::Char, 1).read_i64(b"A"), None);
    }

    #[test]
    fn test_read_i64_applies_tzero() {
        let unsigned = Column {
            name: "TARGETID".into(),
            format: "K".into(),
            kind: ColumnKind::I64,
            repeat: 1,
            offset: 0,
            width: 8,
            scale: 1.0,
            zero: 9_223_372_036_854_775_808.0,
        };
        // Stored as id - 2^63.
        let stored = (i64::MIN + 20).to_be_bytes();
        assert_eq!(unsigned.read_i64(&stored), Some(20));
        // Unsigned ids above i64::MAX do not fit a target id.
        assert_eq!(unsigned.read_i64(&5_i64.to_be_bytes()), None);

        let scaled = Column {
            scale: 2.0,
            zero: 1.0,
            ..unsigned
        };
        assert_eq!(scaled.read_i64(&10_i64.to_be_bytes()), Some(21));
    }
}
