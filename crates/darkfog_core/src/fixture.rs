//! Synthetic save images for tests.
//!
//! Field layout is written out by hand here rather than generated from the
//! decoder's tables, so tests exercise the tables instead of echoing them.

use crate::combat::{CombatSettings, Difficulty};
use crate::header::{FILE_SIZE_OFFSET, SAVE_MAGIC};
use crate::hive::HIVE_MAGIC;
use crate::layout::{ByteRange, HiveRegion};
use crate::reader::encode_7bit_len;

const FILLER: u8 = 0xEE;
/// Padding beyond the back section so the region stays in the back half of
/// the file after this many bytes of hives are spliced in.
pub const SPLICE_HEADROOM: usize = 8 * 1024;

/// Bytes of one hive record body (everything after the magic tag).
#[derive(Debug, Clone)]
pub struct HiveRecordBuilder {
    version: i32,
    seed: i32,
    builders: usize,
    idle_relays: Vec<i32>,
    idle_tinders: Vec<i32>,
}

impl HiveRecordBuilder {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            seed: 1,
            builders: 0,
            idle_relays: Vec::new(),
            idle_tinders: Vec::new(),
        }
    }

    pub fn seed(mut self, seed: i32) -> Self {
        self.seed = seed;
        self
    }

    pub fn builders(mut self, count: usize) -> Self {
        self.builders = count;
        self
    }

    pub fn idle_ids(mut self, relays: &[i32], tinders: &[i32]) -> Self {
        self.idle_relays = relays.to_vec();
        self.idle_tinders = tinders.to_vec();
        self
    }

    pub fn build_body(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.i32(self.version);
        w.i32(100 + self.seed);
        w.i32(self.seed);
        w.i32(self.seed.wrapping_mul(31));

        w.i32(self.builders as i32);
        for i in 0..self.builders as i32 {
            for v in [i + 1, 8100 + i, 3, i - 1, 0, 40, 20, 600] {
                w.i32(v);
            }
            for v in [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0] {
                w.f32(v);
            }
        }

        w.bool(true);
        w.bool(false);
        for v in [1200, 0, 0] {
            w.i32(v);
        }
        w.bool(true);
        for v in [55, 21, 300, 280, 7] {
            w.i32(v);
        }
        w.bool(false);
        w.i32(2);
        if self.version >= 1 {
            w.f32(3.5);
            if self.version == 1 {
                w.i32(9);
            }
        }
        if self.version >= 3 {
            w.i32(4);
        }

        // 7 data pools, the relay object pool, tinders and units
        for _ in 0..10 {
            for v in [8, 1, 0] {
                w.i32(v);
            }
        }

        for ids in [&self.idle_relays, &self.idle_tinders] {
            w.i32((ids.len() as i32).max(4));
            w.i32(ids.len() as i32);
            for &id in ids.iter() {
                w.i32(id);
            }
        }

        for _ in 0..3 {
            for v in [0, 12, 0] {
                w.i32(v);
            }
        }

        w.i32(1);
        w.i32(5);
        for v in [1000i64, 2000, 3000, 0] {
            w.i64(v);
        }
        for v in [10, 100, 0, 2, 3600, 900, 1] {
            w.i32(v);
        }

        for _ in 0..2 {
            w.i32(0);
            for slot in 0..8 {
                w.i64(slot);
                w.i32(0);
            }
        }

        w.bytes
    }

    /// Magic tag followed by the body.
    pub fn build_record(&self) -> Vec<u8> {
        let mut out = HIVE_MAGIC.to_le_bytes().to_vec();
        out.extend(self.build_body());
        out
    }
}

/// A built save plus the positions the builder placed things at.
#[derive(Debug, Clone)]
pub struct FixtureSave {
    pub bytes: Vec<u8>,
    pub region: HiveRegion,
    pub star_ranges: Vec<ByteRange>,
}

#[derive(Debug, Clone)]
pub struct SaveBuilder {
    stars: usize,
    raw_star_count: Option<i32>,
    seed: i32,
    game_name: String,
    user_name: String,
    header_peace: bool,
    desc_peace: bool,
    sandbox: bool,
    theme_ids: Vec<i32>,
    screenshot_len: usize,
    combat: CombatSettings,
    hives_per_star: Option<Vec<usize>>,
    decoy_count: Option<i32>,
    region_offset: Option<usize>,
    tail_len: usize,
}

impl SaveBuilder {
    /// A dark fog save with `stars` stars and no hive collection; the region
    /// is written as a bare zero count.
    pub fn new(stars: usize) -> Self {
        Self {
            stars,
            raw_star_count: None,
            seed: 42,
            game_name: "Test Galaxy".to_string(),
            user_name: "player".to_string(),
            header_peace: false,
            desc_peace: false,
            sandbox: false,
            theme_ids: vec![1, 2],
            screenshot_len: 32,
            combat: Difficulty::Normal.settings(),
            hives_per_star: None,
            decoy_count: None,
            region_offset: None,
            tail_len: 48,
        }
    }

    pub fn seed(mut self, seed: i32) -> Self {
        self.seed = seed;
        self
    }

    pub fn game_name(mut self, name: &str) -> Self {
        self.game_name = name.to_string();
        self
    }

    pub fn user_name(mut self, name: &str) -> Self {
        self.user_name = name.to_string();
        self
    }

    pub fn peace_mode(mut self, peace: bool) -> Self {
        self.header_peace = peace;
        self.desc_peace = peace;
        self
    }

    pub fn peace_flags(mut self, header: bool, desc: bool) -> Self {
        self.header_peace = header;
        self.desc_peace = desc;
        self
    }

    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn theme_ids(mut self, ids: &[i32]) -> Self {
        self.theme_ids = ids.to_vec();
        self
    }

    pub fn screenshot_len(mut self, len: usize) -> Self {
        self.screenshot_len = len;
        self
    }

    pub fn combat(mut self, combat: CombatSettings) -> Self {
        self.combat = combat;
        self
    }

    /// Write this value as the star count instead of `stars`.
    pub fn raw_star_count(mut self, raw: i32) -> Self {
        self.raw_star_count = Some(raw);
        self
    }

    /// Give each star the listed number of hive records; the list length
    /// should equal the star count.
    pub fn hives_per_star(mut self, counts: &[usize]) -> Self {
        self.hives_per_star = Some(counts.to_vec());
        self
    }

    /// Plant `[count][HIVE_MAGIC]` right before the hive count.
    pub fn decoy_before_region(mut self, count: i32) -> Self {
        self.decoy_count = Some(count);
        self
    }

    /// Pad the header so the hive count lands exactly at `offset`. Ignored
    /// if the header already runs past it. No splice headroom is reserved.
    pub fn region_offset(mut self, offset: usize) -> Self {
        self.region_offset = Some(offset);
        self
    }

    pub fn tail_len(mut self, len: usize) -> Self {
        self.tail_len = len;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().bytes
    }

    pub fn build_with_layout(&self) -> FixtureSave {
        let header = self.header_bytes();

        let mut region = Vec::new();
        let mut star_offsets = Vec::new();
        match &self.hives_per_star {
            None => region.extend_from_slice(&0i32.to_le_bytes()),
            Some(counts) => {
                region.extend_from_slice(&(self.stars as i32).to_le_bytes());
                for (star, &count) in counts.iter().enumerate() {
                    let start = region.len();
                    for hive in 0..count {
                        let record = HiveRecordBuilder::new(3)
                            .seed((star * 16 + hive) as i32 + 1)
                            .builders(hive % 3)
                            .build_record();
                        region.extend(record);
                    }
                    region.extend_from_slice(&0i32.to_le_bytes());
                    star_offsets.push((start, region.len()));
                }
            }
        }

        // Adjacent pool header: version 0, capacity, cursor 1, recycle 0.
        let mut trailer = Writer::default();
        for v in [0, 4, 1, 0] {
            trailer.i32(v);
        }
        trailer.bytes.extend(std::iter::repeat_n(FILLER, self.tail_len));

        let decoy_len = if self.decoy_count.is_some() { 8 } else { 0 };
        let back_len = decoy_len + region.len() + trailer.bytes.len();
        let padding = match self.region_offset {
            Some(offset) => offset.saturating_sub(header.len() + decoy_len),
            None => (back_len + SPLICE_HEADROOM)
                .saturating_sub(header.len())
                .max(64),
        };

        let mut bytes = header;
        bytes.extend(std::iter::repeat_n(FILLER, padding));
        if let Some(count) = self.decoy_count {
            bytes.extend_from_slice(&count.to_le_bytes());
            bytes.extend_from_slice(&HIVE_MAGIC.to_le_bytes());
        }
        let count_offset = bytes.len();
        bytes.extend_from_slice(&region);
        let data_end = bytes.len();
        bytes.extend(trailer.bytes);

        let len = bytes.len() as i64;
        bytes[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 8].copy_from_slice(&len.to_le_bytes());

        FixtureSave {
            bytes,
            region: HiveRegion {
                count_offset,
                data_start: count_offset + 4,
                data_end,
            },
            star_ranges: star_offsets
                .into_iter()
                .map(|(s, e)| ByteRange::new(count_offset + s, count_offset + e))
                .collect(),
        }
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.bytes.extend_from_slice(SAVE_MAGIC);
        w.i64(0);
        w.i32(8);
        w.bool(self.sandbox);
        w.bool(self.header_peace);
        for v in [0, 10, 29, 22000] {
            w.i32(v);
        }
        w.i64(3_600_000);
        w.i64(638_000_000_000_000_000);
        w.i32(self.screenshot_len as i32);
        w.bytes.extend(std::iter::repeat_n(0x89, self.screenshot_len));

        // account
        w.i32(1);
        w.i32(2);
        w.u64(76_561_198_000_000_001);
        w.string(&self.user_name);
        w.u64(500);

        // game data version, patch
        w.i32(9);
        w.i32(12);

        // account copy inside game data
        w.i32(1);
        w.i32(2);
        w.u64(76_561_198_000_000_001);
        w.string(&self.user_name);

        w.string(&self.game_name);

        // game descriptor
        w.i32(6);
        w.i64(637_900_000_000_000_000);
        for v in [0, 10, 29, 22000] {
            w.i32(v);
        }
        w.i32(20200101);
        w.i32(self.seed);
        w.i32(self.raw_star_count.unwrap_or(self.stars as i32));
        w.i32(1);
        w.f32(1.0);
        w.i32(self.theme_ids.len() as i32);
        for &id in &self.theme_ids {
            w.i32(id);
        }
        w.bool(true);
        w.bool(self.desc_peace);
        w.bool(self.sandbox);

        // combat settings
        w.i32(0);
        for v in self.combat.to_array() {
            w.f32(v);
        }

        w.bytes
    }
}

/// Wrap an already-located hive collection the way the live-process export
/// delivers it: the count followed by every star's records.
pub fn export_blob(save: &FixtureSave) -> Vec<u8> {
    save.bytes[save.region.count_offset..save.region.data_end].to_vec()
}

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn bool(&mut self, v: bool) {
        self.bytes.push(u8::from(v));
    }

    fn string(&mut self, s: &str) {
        encode_7bit_len(s.len(), &mut self.bytes);
        self.bytes.extend_from_slice(s.as_bytes());
    }
}
