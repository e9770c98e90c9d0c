//! Record layouts as data.
//!
//! Every record the decoder touches is described by a static table of
//! [`FieldSpec`] entries and walked by one driver, so a format revision only
//! edits the table for the record that changed.

use crate::error::{Result, SaveError};
use crate::reader::{ByteCursor, encode_7bit_len};

pub const I32_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I32,
    I64,
    U64,
    F32,
    Bool,
    /// Fixed number of raw bytes.
    Bytes(usize),
    /// 7-bit length prefix followed by UTF-8 bytes.
    String7,
    /// int32 byte length followed by that many bytes, never decoded.
    Blob,
    /// int32 element count followed by that many int32 values, never decoded.
    I32List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    VersionAtLeast(i32),
    VersionEquals(i32),
}

impl Presence {
    pub fn applies(self, version: i32) -> bool {
        match self {
            Self::Always => true,
            Self::VersionAtLeast(min) => version >= min,
            Self::VersionEquals(exact) => version == exact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Always,
        }
    }

    pub const fn since(self, version: i32) -> Self {
        Self {
            presence: Presence::VersionAtLeast(version),
            ..self
        }
    }

    pub const fn only(self, version: i32) -> Self {
        Self {
            presence: Presence::VersionEquals(version),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    /// Raw flag byte; any nonzero value reads as true.
    Flag(u8),
    Bytes(Vec<u8>),
    String(String),
    /// Blob or list that was stepped over; `count` is its stored length.
    Skipped { count: usize },
}

impl FieldValue {
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Flag(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub section: &'static str,
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub value: FieldValue,
}

impl DecodedField {
    /// Bytes that reproduce this field in place, or `None` for fields whose
    /// payload was skipped rather than kept.
    pub fn encode(&self) -> Option<Vec<u8>> {
        let bytes = match &self.value {
            FieldValue::I32(v) => v.to_le_bytes().to_vec(),
            FieldValue::I64(v) => v.to_le_bytes().to_vec(),
            FieldValue::U64(v) => v.to_le_bytes().to_vec(),
            FieldValue::F32(v) => v.to_le_bytes().to_vec(),
            FieldValue::Flag(v) => vec![*v],
            FieldValue::Bytes(b) => b.clone(),
            FieldValue::String(s) => {
                let mut out = Vec::with_capacity(s.len() + 1);
                encode_7bit_len(s.len(), &mut out);
                out.extend_from_slice(s.as_bytes());
                out
            }
            FieldValue::Skipped { .. } => return None,
        };
        // A non-minimal length prefix would not round-trip; leave it alone.
        (bytes.len() == self.width).then_some(bytes)
    }
}

/// Decode every applicable field of `table`, keeping values and offsets.
pub fn decode_fields(
    r: &mut ByteCursor<'_>,
    section: &'static str,
    table: &[FieldSpec],
    version: i32,
) -> Result<Vec<DecodedField>> {
    let mut out = Vec::with_capacity(table.len());
    for spec in table.iter().filter(|s| s.presence.applies(version)) {
        let offset = r.position();
        let value = decode_value(r, spec)?;
        out.push(DecodedField {
            section,
            name: spec.name,
            offset,
            width: r.position() - offset,
            value,
        });
    }
    Ok(out)
}

/// Step over every applicable field of `table` without building values.
pub fn skip_fields(r: &mut ByteCursor<'_>, table: &[FieldSpec], version: i32) -> Result<()> {
    for spec in table.iter().filter(|s| s.presence.applies(version)) {
        match spec.kind {
            FieldKind::I32 | FieldKind::F32 => r.skip(4)?,
            FieldKind::I64 | FieldKind::U64 => r.skip(8)?,
            FieldKind::Bool => r.skip(1)?,
            FieldKind::Bytes(n) => r.skip(n)?,
            FieldKind::String7 => {
                let len = r.read_7bit_len()?;
                r.skip(len)?;
            }
            FieldKind::Blob | FieldKind::I32List => {
                decode_value(r, spec)?;
            }
        }
    }
    Ok(())
}

/// Fixed byte width of `table` for `version`, or `None` if any field is
/// variable-length.
pub fn fixed_width(table: &[FieldSpec], version: i32) -> Option<usize> {
    table
        .iter()
        .filter(|s| s.presence.applies(version))
        .map(|s| match s.kind {
            FieldKind::I32 | FieldKind::F32 => Some(4),
            FieldKind::I64 | FieldKind::U64 => Some(8),
            FieldKind::Bool => Some(1),
            FieldKind::Bytes(n) => Some(n),
            FieldKind::String7 | FieldKind::Blob | FieldKind::I32List => None,
        })
        .sum()
}

fn decode_value(r: &mut ByteCursor<'_>, spec: &FieldSpec) -> Result<FieldValue> {
    Ok(match spec.kind {
        FieldKind::I32 => FieldValue::I32(r.read_i32()?),
        FieldKind::I64 => FieldValue::I64(r.read_i64()?),
        FieldKind::U64 => FieldValue::U64(r.read_u64()?),
        FieldKind::F32 => FieldValue::F32(r.read_f32()?),
        FieldKind::Bool => FieldValue::Flag(r.read_u8()?),
        FieldKind::Bytes(n) => FieldValue::Bytes(r.read_bytes(n)?.to_vec()),
        FieldKind::String7 => FieldValue::String(r.read_string()?),
        FieldKind::Blob => {
            let count = read_count(r, spec.name)?;
            r.skip(count)?;
            FieldValue::Skipped { count }
        }
        FieldKind::I32List => {
            let count = read_count(r, spec.name)?;
            let width = count
                .checked_mul(I32_WIDTH)
                .ok_or_else(|| SaveError::structural(r.position(), "list length overflow"))?;
            r.skip(width)?;
            FieldValue::Skipped { count }
        }
    })
}

/// Read an int32 length prefix that must be non-negative.
pub fn read_count(r: &mut ByteCursor<'_>, what: &str) -> Result<usize> {
    let offset = r.position();
    let raw = r.read_i32()?;
    usize::try_from(raw)
        .map_err(|_| SaveError::structural(offset, format!("negative {what} length {raw}")))
}

/// Look up a decoded field by section and name.
pub fn find<'f>(
    fields: &'f [DecodedField],
    section: &str,
    name: &str,
) -> Result<&'f DecodedField> {
    fields
        .iter()
        .find(|f| f.section == section && f.name == name)
        .ok_or_else(|| SaveError::structural(0, format!("field {section}.{name} was not decoded")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[FieldSpec] = &[
        FieldSpec::new("version", FieldKind::I32),
        FieldSpec::new("flag", FieldKind::Bool),
        FieldSpec::new("extra", FieldKind::F32).since(1),
        FieldSpec::new("legacy", FieldKind::I32).only(1),
        FieldSpec::new("name", FieldKind::String7),
        FieldSpec::new("ids", FieldKind::I32List),
    ];

    fn sample_bytes(with_extra: bool, with_legacy: bool) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&7i32.to_le_bytes());
        out.push(3);
        if with_extra {
            out.extend_from_slice(&2.5f32.to_le_bytes());
        }
        if with_legacy {
            out.extend_from_slice(&11i32.to_le_bytes());
        }
        out.push(2);
        out.extend_from_slice(b"ok");
        out.extend_from_slice(&2i32.to_le_bytes());
        out.extend_from_slice(&[0xAA; 8]);
        out
    }

    #[test]
    fn presence_follows_version() {
        assert!(Presence::Always.applies(-1));
        assert!(Presence::VersionAtLeast(3).applies(3));
        assert!(!Presence::VersionAtLeast(3).applies(2));
        assert!(Presence::VersionEquals(1).applies(1));
        assert!(!Presence::VersionEquals(1).applies(2));
    }

    #[test]
    fn decodes_version_conditional_fields() {
        let bytes = sample_bytes(true, true);
        let mut r = ByteCursor::new(&bytes);
        let fields = decode_fields(&mut r, "sample", SAMPLE, 1).unwrap();
        assert_eq!(r.remaining(), 0);
        assert_eq!(fields.len(), 6);
        assert_eq!(find(&fields, "sample", "flag").unwrap().value.as_bool(), Some(true));
        assert_eq!(find(&fields, "sample", "legacy").unwrap().offset, 9);
        assert_eq!(
            find(&fields, "sample", "ids").unwrap().value,
            FieldValue::Skipped { count: 2 }
        );

        let bytes = sample_bytes(true, false);
        let mut r = ByteCursor::new(&bytes);
        skip_fields(&mut r, SAMPLE, 2).unwrap();
        assert_eq!(r.remaining(), 0);

        let bytes = sample_bytes(false, false);
        let mut r = ByteCursor::new(&bytes);
        let fields = decode_fields(&mut r, "sample", SAMPLE, 0).unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn encode_reproduces_kept_fields() {
        let bytes = sample_bytes(true, true);
        let mut r = ByteCursor::new(&bytes);
        for field in decode_fields(&mut r, "sample", SAMPLE, 1).unwrap() {
            match field.encode() {
                Some(encoded) => {
                    assert_eq!(encoded, bytes[field.offset..field.offset + field.width])
                }
                None => assert_eq!(field.name, "ids"),
            }
        }
    }

    #[test]
    fn fixed_width_ignores_absent_fields() {
        const FIXED: &[FieldSpec] = &[
            FieldSpec::new("a", FieldKind::I32),
            FieldSpec::new("b", FieldKind::I64),
            FieldSpec::new("c", FieldKind::Bool).since(2),
        ];
        assert_eq!(fixed_width(FIXED, 1), Some(12));
        assert_eq!(fixed_width(FIXED, 2), Some(13));
        assert_eq!(fixed_width(SAMPLE, 0), None);
    }

    #[test]
    fn negative_list_length_is_structural() {
        let bytes = (-1i32).to_le_bytes();
        let err = read_count(&mut ByteCursor::new(&bytes), "ids").unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 0, .. }));
    }
}
