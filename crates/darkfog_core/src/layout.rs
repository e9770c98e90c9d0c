use serde::{Deserialize, Serialize};

use crate::error::{Result, SaveError};
use crate::schema::I32_WIDTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        bytes.get(self.start..self.end).ok_or(SaveError::Truncated {
            offset: self.start,
            width: self.len(),
            len: bytes.len(),
        })
    }
}

/// The star-indexed hive collection: an int32 count at `count_offset`, then
/// the per-star records in `data_start..data_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveRegion {
    pub count_offset: usize,
    pub data_start: usize,
    pub data_end: usize,
}

impl HiveRegion {
    /// A count of zero with no records behind it.
    pub fn empty_at(count_offset: usize) -> Self {
        let data_start = count_offset + I32_WIDTH;
        Self {
            count_offset,
            data_start,
            data_end: data_start,
        }
    }

    /// Everything that gets replaced by a splice, count included.
    pub fn span(&self) -> ByteRange {
        ByteRange::new(self.count_offset, self.data_end)
    }

    pub fn data(&self) -> ByteRange {
        ByteRange::new(self.data_start, self.data_end)
    }

    pub fn has_records(&self) -> bool {
        self.data_end > self.data_start
    }

    pub fn validate(&self, file_len: usize) -> Result<()> {
        if self.data_start != self.count_offset + I32_WIDTH {
            return Err(SaveError::structural(
                self.count_offset,
                format!(
                    "hive data must start right after the count: count at {}, data at {}",
                    self.count_offset, self.data_start
                ),
            ));
        }
        if self.data_end < self.data_start || self.data_end > file_len {
            return Err(SaveError::structural(
                self.data_start,
                format!(
                    "invalid hive data range {}..{} for file length {file_len}",
                    self.data_start, self.data_end
                ),
            ));
        }
        Ok(())
    }
}

/// Where one star's hive records live. Every star owns at least its 4-byte
/// zero sentinel, so `range` is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarBoundary {
    pub star: usize,
    pub range: ByteRange,
    pub hive_count: usize,
}

impl StarBoundary {
    pub fn is_bare_sentinel(&self) -> bool {
        self.range.len() == I32_WIDTH
    }
}

/// Check that `stars` tile `data` exactly, in star order.
pub fn validate_boundaries(data: ByteRange, stars: &[StarBoundary]) -> Result<()> {
    let mut expected = data.start;
    for (index, star) in stars.iter().enumerate() {
        if star.star != index {
            return Err(SaveError::structural(
                star.range.start,
                format!("star boundary {index} is labelled star {}", star.star),
            ));
        }
        if star.range.start != expected {
            return Err(SaveError::structural(
                star.range.start,
                format!(
                    "gap/overlap before star {index}: expected start {expected}, got {}",
                    star.range.start
                ),
            ));
        }
        if star.range.len() < I32_WIDTH {
            return Err(SaveError::structural(
                star.range.start,
                format!(
                    "star {index} range {}..{} cannot hold its sentinel",
                    star.range.start, star.range.end
                ),
            ));
        }
        expected = star.range.end;
    }

    if expected != data.end {
        return Err(SaveError::structural(
            expected,
            format!(
                "star boundaries end at {expected}, hive data ends at {}",
                data.end
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(star: usize, start: usize, end: usize) -> StarBoundary {
        StarBoundary {
            star,
            range: ByteRange::new(start, end),
            hive_count: 0,
        }
    }

    #[test]
    fn empty_region_shape() {
        let region = HiveRegion::empty_at(500);
        assert_eq!(region.data_start, 504);
        assert_eq!(region.data_end, 504);
        assert!(!region.has_records());
        assert_eq!(region.span(), ByteRange::new(500, 504));
        region.validate(504).unwrap();
        assert!(region.validate(503).is_err());
    }

    #[test]
    fn boundaries_must_tile_data() {
        let data = ByteRange::new(100, 210);
        validate_boundaries(data, &[star(0, 100, 140), star(1, 140, 210)]).unwrap();
        assert!(validate_boundaries(data, &[star(0, 100, 140), star(1, 144, 210)]).is_err());
        assert!(validate_boundaries(data, &[star(0, 100, 140)]).is_err());
        assert!(validate_boundaries(data, &[star(1, 100, 140), star(0, 140, 210)]).is_err());
    }

    #[test]
    fn slice_checks_bounds() {
        let bytes = [1u8, 2, 3, 4];
        assert_eq!(ByteRange::new(1, 3).slice(&bytes).unwrap(), &[2, 3]);
        assert!(ByteRange::new(2, 6).slice(&bytes).is_err());
    }
}
