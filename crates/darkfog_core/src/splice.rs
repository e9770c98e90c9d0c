use std::collections::BTreeSet;

use crate::error::{Result, SaveError};
use crate::header::FieldTable;
use crate::hive::walk_stars;
use crate::layout::{ByteRange, HiveRegion, StarBoundary, validate_boundaries};
use crate::mode::{GameMode, patch_file_size, set_mode};
use crate::reader::ByteCursor;
use crate::schema::{I32_WIDTH, read_count};

/// Per-star hive bytes to copy from. Borrowed from either a loaded save or
/// a standalone export of the hive collection.
#[derive(Debug, Clone)]
pub struct HiveSource<'a> {
    bytes: &'a [u8],
    star_count: usize,
    stars: Vec<StarBoundary>,
}

impl<'a> HiveSource<'a> {
    pub fn new(bytes: &'a [u8], star_count: usize, stars: Vec<StarBoundary>) -> Result<Self> {
        if stars.len() != star_count {
            return Err(SaveError::BoundaryCountMismatch {
                expected: star_count,
                actual: stars.len(),
            });
        }
        for star in &stars {
            star.range.slice(bytes)?;
        }
        Ok(Self {
            bytes,
            star_count,
            stars,
        })
    }

    /// Parse a blob laid out exactly like the in-save hive collection: an
    /// int32 star count followed by every star's records.
    pub fn from_export(bytes: &'a [u8]) -> Result<Self> {
        let mut r = ByteCursor::new(bytes);
        let star_count = read_count(&mut r, "exported star")?;
        let stars = walk_stars(bytes, I32_WIDTH, star_count)?;
        let end = stars.last().map_or(I32_WIDTH, |s| s.range.end);
        if end != bytes.len() {
            return Err(SaveError::structural(
                end,
                format!(
                    "{} trailing bytes after {star_count} exported stars",
                    bytes.len() - end
                ),
            ));
        }
        validate_boundaries(ByteRange::new(I32_WIDTH, end), &stars)?;
        Self::new(bytes, star_count, stars)
    }

    pub fn star_count(&self) -> usize {
        self.star_count
    }

    pub fn stars(&self) -> &[StarBoundary] {
        &self.stars
    }

    pub fn hive_count(&self) -> usize {
        self.stars.iter().map(|s| s.hive_count).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpliceStats {
    pub stars_copied: usize,
    pub stars_omitted: usize,
    pub hives_copied: usize,
    pub region_len: usize,
}

/// Build a replacement hive collection: the star count, then each star's
/// source bytes, or a bare zero sentinel for stars listed in `omit`.
pub fn build_region(source: &HiveSource<'_>, omit: &BTreeSet<usize>) -> Result<(Vec<u8>, SpliceStats)> {
    let count = i32::try_from(source.star_count).map_err(|_| {
        SaveError::InvalidInput(format!("star count {} overflows int32", source.star_count))
    })?;
    for &star in omit.range(source.star_count..) {
        tracing::warn!(star, stars = source.star_count, "ignoring omit index past last star");
    }

    let mut out = count.to_le_bytes().to_vec();
    let mut stats = SpliceStats::default();
    for boundary in &source.stars {
        if omit.contains(&boundary.star) {
            out.extend_from_slice(&0i32.to_le_bytes());
            stats.stars_omitted += 1;
        } else {
            out.extend_from_slice(boundary.range.slice(source.bytes)?);
            stats.stars_copied += 1;
            stats.hives_copied += boundary.hive_count;
        }
    }
    stats.region_len = out.len();
    Ok((out, stats))
}

/// Replace `target_region` in `target` with hives from `source`, clear both
/// peace flags and fix the size field. `target` itself is never modified.
pub fn splice(
    source: &HiveSource<'_>,
    target: &[u8],
    target_table: &FieldTable,
    target_region: &HiveRegion,
    omit: &BTreeSet<usize>,
) -> Result<(Vec<u8>, SpliceStats)> {
    target_region.validate(target.len())?;
    for offset in target_table.peace_offsets() {
        if offset >= target_region.count_offset {
            return Err(SaveError::structural(
                offset,
                format!(
                    "peace flag lies inside or after the hive collection at {}",
                    target_region.count_offset
                ),
            ));
        }
    }

    let (region, stats) = build_region(source, omit)?;
    let span = target_region.span();

    let mut out = Vec::with_capacity(target.len() - span.len() + region.len());
    out.extend_from_slice(&target[..span.start]);
    out.extend_from_slice(&region);
    out.extend_from_slice(&target[span.end..]);

    set_mode(&mut out, target_table, GameMode::DarkFog)?;
    patch_file_size(&mut out)?;

    tracing::info!(
        old_len = target.len(),
        new_len = out.len(),
        stars_copied = stats.stars_copied,
        stars_omitted = stats.stars_omitted,
        hives = stats.hives_copied,
        "spliced hive collection"
    );
    Ok((out, stats))
}
