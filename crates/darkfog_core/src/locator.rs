//! Finding the hive collection inside a save.
//!
//! The container stores no offset for it. Two strategies are used, in order:
//!
//! 1. Anchor: find a [`HIVE_MAGIC`] in the back half of the file whose
//!    preceding int32 equals the star count (allowing for leading stars that
//!    own no hives, whose bare zero sentinels sit between the two), then walk
//!    every star to find the end.
//! 2. Empty-region heuristic, only when no magic occurs past the search
//!    start: a save with no hives at all stores a zero count
//!    immediately followed by the next system's pool header, giving the run
//!    `(0, 0, capacity >= 1, 1)`. This is a recurring layout, not a format
//!    guarantee, and can in principle match unrelated data.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SaveError};
use crate::header::FieldTable;
use crate::hive::{HIVE_MAGIC_BYTES, walk_stars};
use crate::layout::{HiveRegion, StarBoundary, validate_boundaries};
use crate::reader::read_i32_at;
use crate::schema::I32_WIDTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStart {
    #[default]
    BackHalf,
    Offset(usize),
}

impl SearchStart {
    pub fn resolve(self, len: usize) -> usize {
        match self {
            Self::BackHalf => len / 2,
            Self::Offset(offset) => offset.min(len),
        }
    }
}

/// Acceptance criterion for the empty-region heuristic: words
/// `(0, 0, capacity, cursor)` with `capacity >= min_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyRegionPattern {
    pub min_capacity: i32,
    pub cursor: i32,
}

impl Default for EmptyRegionPattern {
    fn default() -> Self {
        Self {
            min_capacity: 1,
            cursor: 1,
        }
    }
}

impl EmptyRegionPattern {
    pub fn matches(&self, words: [i32; 4]) -> bool {
        words[0] == 0 && words[1] == 0 && words[2] >= self.min_capacity && words[3] == self.cursor
    }

    fn matches_at(&self, bytes: &[u8], pos: usize) -> bool {
        let mut words = [0i32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            match read_i32_at(bytes, pos + i * I32_WIDTH) {
                Some(v) => *word = v,
                None => return false,
            }
        }
        self.matches(words)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocatorConfig {
    pub search_start: SearchStart,
    pub empty_pattern: EmptyRegionPattern,
    /// Turn off the heuristic to require an anchored match.
    pub anchor_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStrategy {
    Anchor,
    EmptyPattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedRegion {
    pub region: HiveRegion,
    pub strategy: LocateStrategy,
    /// One entry per star for anchored regions; empty for the heuristic.
    pub stars: Vec<StarBoundary>,
}

impl LocatedRegion {
    pub fn hive_count(&self) -> usize {
        self.stars.iter().map(|s| s.hive_count).sum()
    }
}

pub fn locate(bytes: &[u8], table: &FieldTable, config: &LocatorConfig) -> Result<LocatedRegion> {
    let from = config.search_start.resolve(bytes.len());

    if let Some(count_offset) = find_anchor(bytes, table.star_count, from) {
        let data_start = count_offset + I32_WIDTH;
        let stars = walk_stars(bytes, data_start, table.star_count)?;
        let data_end = stars.last().map_or(data_start, |s| s.range.end);
        let region = HiveRegion {
            count_offset,
            data_start,
            data_end,
        };
        region.validate(bytes.len())?;
        validate_boundaries(region.data(), &stars)?;
        tracing::debug!(
            count_offset,
            data_end,
            size = data_end - count_offset,
            "hive collection anchored on magic"
        );
        return Ok(LocatedRegion {
            region,
            strategy: LocateStrategy::Anchor,
            stars,
        });
    }

    if config.anchor_only {
        return Err(SaveError::RegionNotFound(format!(
            "no hive magic preceded by star count {} after offset {from}",
            table.star_count
        )));
    }
    // hives are present but none anchor; the empty-region run would land inside them
    if let Some(pos) = magic_positions(bytes, from).next() {
        return Err(SaveError::RegionNotFound(format!(
            "hive magic at offset {pos} but none preceded by star count {}",
            table.star_count
        )));
    }

    match find_empty_region(bytes, from, &config.empty_pattern) {
        Some(count_offset) => {
            tracing::warn!(
                count_offset,
                "no anchored hive collection; using empty-region heuristic"
            );
            Ok(LocatedRegion {
                region: HiveRegion::empty_at(count_offset),
                strategy: LocateStrategy::EmptyPattern,
                stars: Vec::new(),
            })
        }
        None => Err(SaveError::RegionNotFound(format!(
            "no anchored hive collection and no empty-region pattern after offset {from}"
        ))),
    }
}

/// Offset of the hive count for the first magic occurrence at or after
/// `from` that is preceded by `star_count`, possibly with up to
/// `star_count - 1` zero sentinels in between.
pub fn find_anchor(bytes: &[u8], star_count: usize, from: usize) -> Option<usize> {
    if star_count == 0 {
        return None;
    }
    let expected = i32::try_from(star_count).ok()?;
    magic_positions(bytes, from).find_map(|pos| anchor_for(bytes, pos, expected))
}

fn anchor_for(bytes: &[u8], magic_pos: usize, expected: i32) -> Option<usize> {
    let mut candidate = magic_pos.checked_sub(I32_WIDTH)?;
    let mut empty_stars = 0;
    loop {
        let value = read_i32_at(bytes, candidate)?;
        if value == expected {
            return Some(candidate);
        }
        if value != 0 || empty_stars + 1 >= expected {
            return None;
        }
        empty_stars += 1;
        candidate = candidate.checked_sub(I32_WIDTH)?;
    }
}

fn magic_positions(bytes: &[u8], from: usize) -> impl Iterator<Item = usize> + '_ {
    let start = from.min(bytes.len());
    bytes[start..]
        .windows(HIVE_MAGIC_BYTES.len())
        .enumerate()
        .filter(|(_, w)| *w == HIVE_MAGIC_BYTES)
        .map(move |(i, _)| start + i)
}

/// First offset at or after `from` where `pattern` matches.
pub fn find_empty_region(bytes: &[u8], from: usize, pattern: &EmptyRegionPattern) -> Option<usize> {
    let last = bytes.len().checked_sub(4 * I32_WIDTH)?;
    (from..=last).find(|&pos| pattern.matches_at(bytes, pos))
}
