//! Header cards: 80-byte keyword records kept verbatim, values parsed on demand.

use std::fmt;

use super::error::{FitsError, Result};
use super::{BLOCK_LEN, CARD_LEN, padded_len};

/// `[i64::MIN, i64::MAX]` as exact floats; the upper bound (2^63) is excluded.
pub(crate) const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
pub(crate) const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Parsed value of a keyword card.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    /// Value field present but empty or not representable here (e.g. complex).
    Undefined,
}

impl Value {
    /// Numeric view: integers and floats both compare as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view. Floats are accepted when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f) => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Right-justified (or quoted, left-justified) value field, columns 11-80.
    fn to_field(&self) -> String {
        match self {
            Value::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            Value::Integer(i) => format!("{i:>20}"),
            Value::Float(f) => format!("{:>20}", format_float(*f)),
            Value::Str(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped:<8}'")
            }
            Value::Undefined => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Undefined => write!(f, "<undefined>"),
        }
    }
}

/// Floats always carry a decimal point so readers do not take them for integers.
fn format_float(f: f64) -> String {
    let s = format!("{f:E}");
    match s.split_once('E') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0E{exp}"),
        _ => s,
    }
}

/// One 80-byte header record.
#[derive(Clone, PartialEq, Eq)]
pub struct Card([u8; CARD_LEN]);

impl Card {
    /// Build a card from exactly [`CARD_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Card)
    }

    /// Build a `KEYWORD = value` card.
    pub fn new(keyword: &str, value: &Value) -> Self {
        let mut raw = [b' '; CARD_LEN];
        let key = keyword.to_ascii_uppercase();
        let text = format!("{key:<8}= {}", value.to_field());
        for (dst, src) in raw.iter_mut().zip(text.bytes()) {
            *dst = src;
        }
        Card(raw)
    }

    pub fn end() -> Self {
        let mut raw = [b' '; CARD_LEN];
        raw[..3].copy_from_slice(b"END");
        Card(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn keyword(&self) -> &str {
        std::str::from_utf8(&self.0[..8]).unwrap_or("").trim_end()
    }

    pub fn is_end(&self) -> bool {
        self.keyword() == "END"
    }

    fn has_value(&self) -> bool {
        &self.0[8..10] == b"= "
    }

    /// Parsed value, or `None` for commentary cards.
    pub fn value(&self) -> Option<Value> {
        if !self.has_value() {
            return None;
        }
        let field = String::from_utf8_lossy(&self.0[10..]);
        Some(parse_value_field(field.trim_start()))
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card({:?})", String::from_utf8_lossy(&self.0).trim_end())
    }
}

fn parse_value_field(field: &str) -> Value {
    if let Some(rest) = field.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return Value::Str(out.trim_end().to_string());
    }

    let raw = field.split('/').next().unwrap_or("").trim();
    match raw {
        "" => Value::Undefined,
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::Integer(i);
            }
            match raw.replace(['D', 'd'], "E").parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Undefined,
            }
        }
    }
}

/// Ordered header cards of one section, without the terminating `END`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Header of an empty primary section.
    pub fn empty_primary() -> Self {
        let mut header = Header::default();
        header.set("SIMPLE", Value::Logical(true));
        header.set("BITPIX", Value::Integer(8));
        header.set("NAXIS", Value::Integer(0));
        header.set("EXTEND", Value::Logical(true));
        header
    }

    /// Parse a header at the start of `bytes`. Returns the header and the number of bytes it
    /// occupies including block padding.
    pub fn parse(bytes: &[u8], start: usize) -> Result<(Self, usize)> {
        let mut cards = Vec::new();
        for (i, chunk) in bytes.chunks(CARD_LEN).enumerate() {
            let Some(card) = Card::from_bytes(chunk) else {
                break;
            };
            if card.is_end() {
                let consumed = padded_len((i + 1) * CARD_LEN);
                if consumed > bytes.len() {
                    return Err(FitsError::Truncated(format!(
                        "header padding at byte {start}"
                    )));
                }
                return Ok((Header { cards }, consumed));
            }
            cards.push(card);
        }
        Err(FitsError::MissingEnd(start))
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, keyword: &str) -> Option<Value> {
        self.cards
            .iter()
            .find(|c| c.keyword().eq_ignore_ascii_case(keyword))
            .and_then(Card::value)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_i64(&self, keyword: &str) -> Result<i64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value.as_i64().ok_or_else(|| FitsError::InvalidKeyword {
            key: keyword.to_string(),
            value: value.to_string(),
        })
    }

    pub fn get_f64(&self, keyword: &str) -> Result<f64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value.as_f64().ok_or_else(|| FitsError::InvalidKeyword {
            key: keyword.to_string(),
            value: value.to_string(),
        })
    }

    pub fn get_str(&self, keyword: &str) -> Option<String> {
        self.get(keyword).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Replace the first card with this keyword, or append one.
    pub fn set(&mut self, keyword: &str, value: Value) {
        let card = Card::new(keyword, &value);
        match self
            .cards
            .iter_mut()
            .find(|c| c.keyword().eq_ignore_ascii_case(keyword))
        {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.cards.first().is_some_and(|c| c.keyword() == "SIMPLE")
    }

    /// `XTENSION` value (`BINTABLE`, `IMAGE`, `TABLE`), `None` for a primary header.
    pub fn xtension(&self) -> Option<String> {
        self.get_str("XTENSION")
    }

    fn non_negative(&self, keyword: &str, default: Option<i64>) -> Result<usize> {
        let v = match (self.get(keyword), default) {
            (None, Some(d)) => d,
            _ => self.get_i64(keyword)?,
        };
        usize::try_from(v).map_err(|_| FitsError::InvalidKeyword {
            key: keyword.to_string(),
            value: v.to_string(),
        })
    }

    /// Payload size in bytes, before block padding.
    pub fn data_len(&self) -> Result<usize> {
        let naxis = self.non_negative("NAXIS", None)?;
        if naxis == 0 {
            return Ok(0);
        }
        let bitpix = self.get_i64("BITPIX")?;
        let bytes_per_value = (bitpix.unsigned_abs() / 8) as usize;
        let mut elements = 1_usize;
        for axis in 1..=naxis {
            elements = elements.saturating_mul(self.non_negative(&format!("NAXIS{axis}"), None)?);
        }
        let pcount = self.non_negative("PCOUNT", Some(0))?;
        let gcount = self.non_negative("GCOUNT", Some(1))?;
        pcount
            .checked_add(elements)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bytes_per_value))
            .filter(|_| elements != usize::MAX)
            .ok_or_else(|| FitsError::InvalidKeyword {
                key: "NAXIS".to_string(),
                value: format!("payload size overflows ({naxis} axes, {elements} elements)"),
            })
    }

    /// Cards plus `END`, space-padded to a block boundary.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(padded_len((self.cards.len() + 1) * CARD_LEN));
        for card in &self.cards {
            out.extend_from_slice(card.as_bytes());
        }
        out.extend_from_slice(Card::end().as_bytes());
        out.resize(padded_len(out.len()).max(BLOCK_LEN), b' ');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> Card {
        let mut raw = [b' '; CARD_LEN];
        raw[..text.len()].copy_from_slice(text.as_bytes());
        Card(raw)
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            card("TARGETID=     39627640566453451 / id").value(),
            Some(Value::Integer(39627640566453451))
        );
        assert_eq!(
            card("MEANSNR =     1.2345678901E+00").value(),
            Some(Value::Float(1.2345678901))
        );
        assert_eq!(card("BLINDING= 'desi_y1 '").value(), Some(Value::Str("desi_y1".into())));
        assert_eq!(card("NOTE    = 'it''s'").value(), Some(Value::Str("it's".into())));
        assert_eq!(card("EXTEND  =                    T").value(), Some(Value::Logical(true)));
        assert_eq!(card("RA      =  1.5D2").value(), Some(Value::Float(150.0)));
        assert_eq!(card("COMMENT no value here").value(), None);
    }

    #[test]
    fn test_new_card_round_trips_value() {
        for value in [
            Value::Integer(-42),
            Value::Float(2.0),
            Value::Float(1.999),
            Value::Logical(false),
            Value::Str("20".into()),
        ] {
            assert_eq!(Card::new("KEY", &value).value(), Some(value));
        }
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut header = Header::default();
        header.set("XTENSION", Value::Str("BINTABLE".into()));
        header.set("EXTNAME", Value::Str("DELTA".into()));
        header.set("TARGETID", Value::Integer(10));
        header.set("EXTNAME", Value::Str("10".into()));
        assert_eq!(header.cards().len(), 3);
        assert_eq!(header.cards()[1].keyword(), "EXTNAME");
        assert_eq!(header.get_str("EXTNAME").as_deref(), Some("10"));
    }

    #[test]
    fn test_header_bytes_parse_back() {
        let header = Header::empty_primary();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), BLOCK_LEN);
        let (parsed, used) = Header::parse(&bytes, 0).unwrap();
        assert_eq!(used, BLOCK_LEN);
        assert_eq!(parsed, header);
        assert!(parsed.is_primary());
        assert_eq!(parsed.data_len().unwrap(), 0);
    }

    #[test]
    fn test_missing_end() {
        let bytes = vec![b' '; BLOCK_LEN];
        assert!(matches!(Header::parse(&bytes, 0), Err(FitsError::MissingEnd(0))));
    }

    #[test]
    fn test_data_len_binary_table() {
        let mut header = Header::default();
        header.set("XTENSION", Value::Str("BINTABLE".into()));
        header.set("BITPIX", Value::Integer(8));
        header.set("NAXIS", Value::Integer(2));
        header.set("NAXIS1", Value::Integer(24));
        header.set("NAXIS2", Value::Integer(5));
        header.set("PCOUNT", Value::Integer(16));
        header.set("GCOUNT", Value::Integer(1));
        assert_eq!(header.data_len().unwrap(), 24 * 5 + 16);
    }

    #[test]
    fn test_data_len_overflow_is_error() {
        let mut header = Header::default();
        header.set("XTENSION", Value::Str("IMAGE".into()));
        header.set("BITPIX", Value::Integer(64));
        header.set("NAXIS", Value::Integer(1));
        header.set("NAXIS1", Value::Integer(1 << 62));
        assert!(matches!(header.data_len(), Err(FitsError::InvalidKeyword { .. })));

        header.set("NAXIS", Value::Integer(3));
        header.set("NAXIS2", Value::Integer(1 << 62));
        header.set("NAXIS3", Value::Integer(1 << 62));
        header.set("BITPIX", Value::Integer(8));
        header.set("PCOUNT", Value::Integer(1));
        assert!(matches!(header.data_len(), Err(FitsError::InvalidKeyword { .. })));
    }

    #[test]
    fn test_as_i64_range() {
        assert_eq!(Value::Float(-9_223_372_036_854_775_808.0).as_i64(), Some(i64::MIN));
        assert_eq!(Value::Float(9_223_372_036_854_775_808.0).as_i64(), None);
        assert_eq!(Value::Float(1.8446744073709552e19).as_i64(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_i64(), None);
    }
}
