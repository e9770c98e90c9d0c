use crate::error::{Result, SaveError};

/// Longest 7-bit length prefix a 32-bit length can occupy.
const MAX_7BIT_GROUPS: u32 = 5;

/// Forward reader over an in-memory save image. All multi-byte values are
/// little-endian.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        let mut cursor = Self::new(data);
        cursor.seek_to(pos)?;
        Ok(cursor)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek_to(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.take_array().map(i64::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Read a .NET `BinaryWriter` style length: 7 bits per byte, least
    /// significant group first, high bit set on every byte but the last.
    pub fn read_7bit_len(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut value: u32 = 0;
        for group in 0..MAX_7BIT_GROUPS {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value as usize);
            }
        }
        Err(SaveError::structural(
            start,
            "7-bit encoded length longer than five bytes",
        ))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_7bit_len()?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|source| SaveError::InvalidUtf8 { offset, source })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn out_of_bounds(&self, offset: usize, width: usize) -> SaveError {
        SaveError::Truncated {
            offset,
            width,
            len: self.data.len(),
        }
    }
}

/// Encode a length the way [`ByteCursor::read_7bit_len`] decodes it.
pub fn encode_7bit_len(mut len: usize, out: &mut Vec<u8>) {
    while len >= 0x80 {
        out.push((len as u8 & 0x7F) | 0x80);
        len >>= 7;
    }
    out.push(len as u8);
}

/// Overwrite `bytes.len()` bytes of `buf` at `offset`, refusing to grow it.
pub fn patch_at(buf: &mut [u8], offset: usize, bytes: &[u8], field: &str) -> Result<()> {
    let end = offset
        .checked_add(bytes.len())
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| SaveError::Truncated {
            offset,
            width: bytes.len(),
            len: buf.len(),
        })?;
    tracing::trace!(field, offset, width = bytes.len(), "patching bytes");
    buf[offset..end].copy_from_slice(bytes);
    Ok(())
}

pub fn read_i32_at(buf: &[u8], offset: usize) -> Option<i32> {
    let end = offset.checked_add(4)?;
    let bytes = buf.get(offset..end)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-0.25f64).to_le_bytes());
        data.push(2);

        let mut r = ByteCursor::new(&data);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -0.25);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reads_multi_byte_7bit_length() {
        // 300 = 0b1_0010_1100 -> 0xAC 0x02
        let mut data = vec![0xAC, 0x02];
        data.extend(std::iter::repeat_n(b'a', 300));
        let mut r = ByteCursor::new(&data);
        let s = r.read_string().unwrap();
        assert_eq!(s.len(), 300);
        assert_eq!(r.position(), 302);
    }

    #[test]
    fn encodes_lengths_the_reader_accepts() {
        for len in [0usize, 1, 127, 128, 16_383, 16_384, 2_000_000] {
            let mut out = Vec::new();
            encode_7bit_len(len, &mut out);
            assert_eq!(ByteCursor::new(&out).read_7bit_len().unwrap(), len);
        }
    }

    #[test]
    fn rejects_overlong_7bit_length() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let err = ByteCursor::new(&data).read_7bit_len().unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 0, .. }));
    }

    #[test]
    fn reading_past_end_is_truncated() {
        let data = [1u8, 2, 3];
        let mut r = ByteCursor::new(&data);
        let err = r.read_i32().unwrap_err();
        assert!(matches!(
            err,
            SaveError::Truncated {
                offset: 0,
                width: 4,
                len: 3
            }
        ));
        // A failed read does not move the cursor.
        assert_eq!(r.position(), 0);
        assert!(r.seek_to(4).is_err());
        assert!(r.skip(3).is_ok());
    }

    #[test]
    fn invalid_utf8_reports_payload_offset() {
        let data = [2u8, 0xC3, 0x28];
        let err = ByteCursor::new(&data).read_string().unwrap_err();
        assert!(matches!(err, SaveError::InvalidUtf8 { offset: 1, .. }));
    }

    #[test]
    fn patch_refuses_to_grow() {
        let mut buf = vec![0u8; 6];
        patch_at(&mut buf, 2, &[9, 9, 9, 9], "test").unwrap();
        assert_eq!(buf, [0, 0, 9, 9, 9, 9]);
        assert!(patch_at(&mut buf, 3, &[1, 1, 1, 1], "test").is_err());
        assert_eq!(read_i32_at(&buf, 2), Some(i32::from_le_bytes([9; 4])));
        assert_eq!(read_i32_at(&buf, 3), None);
    }
}
