//! Walking dark fog hive records without materialising them.
//!
//! A hive record is only decoded far enough to know where it ends. Each star
//! owns zero or more records, each tagged with [`HIVE_MAGIC`], followed by a
//! single int32 zero.

use std::ops::RangeInclusive;

use crate::error::{Result, SaveError};
use crate::layout::{ByteRange, StarBoundary};
use crate::reader::ByteCursor;
use crate::schema::{FieldKind, FieldSpec, I32_WIDTH, decode_fields, read_count, skip_fields};

pub const HIVE_MAGIC: i32 = 19884;
pub const HIVE_MAGIC_BYTES: [u8; 4] = HIVE_MAGIC.to_le_bytes();
pub const STAR_SENTINEL: i32 = 0;

/// Record versions the layout below has been checked against.
pub const KNOWN_HIVE_VERSIONS: RangeInclusive<i32> = 0..=8;

const DATA_POOLS_BEFORE_RELAYS: usize = 7;
const DATA_POOLS_AFTER_RELAYS: usize = 2;
const IDLE_ID_LISTS: usize = 2;
const ENEMY_FORMATIONS: usize = 3;
const HATRED_LISTS: usize = 2;
const HATRED_SLOTS: usize = 8;

const HIVE_IDENTITY: &[FieldSpec] = &[
    FieldSpec::new("astro_id", FieldKind::I32),
    FieldSpec::new("seed", FieldKind::I32),
    FieldSpec::new("rt_seed", FieldKind::I32),
];

pub const PATTERN_BUILDER: &[FieldSpec] = &[
    FieldSpec::new("inst_builder_id", FieldKind::I32),
    FieldSpec::new("proto_id", FieldKind::I32),
    FieldSpec::new("model_index", FieldKind::I32),
    FieldSpec::new("parent_index", FieldKind::I32),
    FieldSpec::new("child_count", FieldKind::I32),
    FieldSpec::new("matter_cost", FieldKind::I32),
    FieldSpec::new("matter_provided", FieldKind::I32),
    FieldSpec::new("work_ticks", FieldKind::I32),
    FieldSpec::new("lpos_x", FieldKind::F32),
    FieldSpec::new("lpos_y", FieldKind::F32),
    FieldSpec::new("lpos_z", FieldKind::F32),
    FieldSpec::new("lrot_x", FieldKind::F32),
    FieldSpec::new("lrot_y", FieldKind::F32),
    FieldSpec::new("lrot_z", FieldKind::F32),
    FieldSpec::new("lrot_w", FieldKind::F32),
];

pub const PATTERN_BUILDER_WIDTH: usize = 8 * 4 + 7 * 4;

const HIVE_STATE: &[FieldSpec] = &[
    FieldSpec::new("realized", FieldKind::Bool),
    FieldSpec::new("is_empty", FieldKind::Bool),
    FieldSpec::new("ticks", FieldKind::I32),
    FieldSpec::new("turbo_ticks", FieldKind::I32),
    FieldSpec::new("turbo_repress", FieldKind::I32),
    FieldSpec::new("matter_stat_complete", FieldKind::Bool),
    FieldSpec::new("matter_product_stat", FieldKind::I32),
    FieldSpec::new("matter_consume_stat", FieldKind::I32),
    FieldSpec::new("matter_production", FieldKind::I32),
    FieldSpec::new("matter_consumption", FieldKind::I32),
    FieldSpec::new("root_enemy_id", FieldKind::I32),
    FieldSpec::new("is_carrier_realized", FieldKind::Bool),
    FieldSpec::new("tinders_in_transit", FieldKind::I32),
    FieldSpec::new("lancer_assault_count_base", FieldKind::F32).since(1),
    FieldSpec::new("legacy_counter", FieldKind::I32).only(1),
    FieldSpec::new("relay_neutralized_counter", FieldKind::I32).since(3),
];

const POOL_HEADER: &[FieldSpec] = &[
    FieldSpec::new("capacity", FieldKind::I32),
    FieldSpec::new("cursor", FieldKind::I32),
    FieldSpec::new("recycle_cursor", FieldKind::I32),
];

const ENEMY_FORMATION: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("port_count", FieldKind::I32),
    FieldSpec::new("vacancy_cursor", FieldKind::I32),
];

pub const EVOLVE_DATA: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("level", FieldKind::I32),
    FieldSpec::new("expl", FieldKind::I64),
    FieldSpec::new("expf", FieldKind::I64),
    FieldSpec::new("expp", FieldKind::I64),
    FieldSpec::new("exppshr", FieldKind::I64),
    FieldSpec::new("threat", FieldKind::I32),
    FieldSpec::new("max_threat", FieldKind::I32),
    FieldSpec::new("threatshr", FieldKind::I32),
    FieldSpec::new("waves", FieldKind::I32),
    FieldSpec::new("wave_ticks", FieldKind::I32),
    FieldSpec::new("wave_asm_ticks", FieldKind::I32),
    FieldSpec::new("rank_base", FieldKind::I32),
];

const HATRED_SLOT: &[FieldSpec] = &[
    FieldSpec::new("target", FieldKind::I64),
    FieldSpec::new("value", FieldKind::I32),
];

/// Advance past one hive record body. `r` must sit on the byte after the
/// record's magic tag. Returns the end offset.
///
/// Sub-pools are stepped over by their three header ints only; their element
/// payloads are assumed absent.
pub fn skip_hive_record(r: &mut ByteCursor<'_>) -> Result<usize> {
    let record_start = r.position();
    let version = r.read_i32()?;
    if !KNOWN_HIVE_VERSIONS.contains(&version) {
        return Err(SaveError::structural(
            record_start,
            format!(
                "hive record version {version} outside known range {}..={}",
                KNOWN_HIVE_VERSIONS.start(),
                KNOWN_HIVE_VERSIONS.end()
            ),
        ));
    }
    skip_fields(r, HIVE_IDENTITY, version)?;

    let builders_at = r.position();
    let builders = read_count(r, "pattern builder")?;
    if builders.saturating_mul(PATTERN_BUILDER_WIDTH) > r.remaining() {
        return Err(SaveError::structural(
            builders_at,
            format!(
                "{builders} pattern builders cannot fit in remaining {} bytes",
                r.remaining()
            ),
        ));
    }
    for _ in 0..builders {
        skip_fields(r, PATTERN_BUILDER, version)?;
    }

    skip_fields(r, HIVE_STATE, version)?;

    for _ in 0..DATA_POOLS_BEFORE_RELAYS {
        skip_pool_header(r)?;
    }
    // relays live in an object pool; same header shape
    skip_pool_header(r)?;
    for _ in 0..DATA_POOLS_AFTER_RELAYS {
        skip_pool_header(r)?;
    }

    for _ in 0..IDLE_ID_LISTS {
        skip_id_list(r)?;
    }
    for _ in 0..ENEMY_FORMATIONS {
        skip_fields(r, ENEMY_FORMATION, version)?;
    }
    skip_fields(r, EVOLVE_DATA, version)?;
    for _ in 0..HATRED_LISTS {
        r.skip(I32_WIDTH)?;
        for _ in 0..HATRED_SLOTS {
            skip_fields(r, HATRED_SLOT, version)?;
        }
    }

    let end = r.position();
    tracing::trace!(record_start, end, version, builders, "skipped hive record");
    Ok(end)
}

fn skip_pool_header(r: &mut ByteCursor<'_>) -> Result<()> {
    let fields = decode_fields(r, "pool", POOL_HEADER, 0)?;
    for field in &fields {
        if let Some(value) = field.value.as_i32().filter(|v| *v < 0) {
            return Err(SaveError::structural(
                field.offset,
                format!("negative pool {} {value}", field.name),
            ));
        }
    }
    Ok(())
}

fn skip_id_list(r: &mut ByteCursor<'_>) -> Result<()> {
    let at = r.position();
    let capacity = r.read_i32()?;
    if capacity < 0 {
        return Err(SaveError::structural(
            at,
            format!("negative id list capacity {capacity}"),
        ));
    }
    let count = read_count(r, "id list")?;
    let width = count
        .checked_mul(I32_WIDTH)
        .ok_or_else(|| SaveError::structural(at, "id list length overflow"))?;
    r.skip(width)
}

/// Walk one star's records up to and including its zero sentinel.
pub fn skip_star(r: &mut ByteCursor<'_>, star: usize) -> Result<StarBoundary> {
    let start = r.position();
    let mut hive_count = 0;
    loop {
        let at = r.position();
        match r.read_i32()? {
            HIVE_MAGIC => {
                skip_hive_record(r)?;
                hive_count += 1;
            }
            STAR_SENTINEL => break,
            other => {
                return Err(SaveError::structural(
                    at,
                    format!("expected hive magic or zero sentinel for star {star}, found {other}"),
                ));
            }
        }
    }
    Ok(StarBoundary {
        star,
        range: ByteRange::new(start, r.position()),
        hive_count,
    })
}

/// Walk `star_count` consecutive stars starting at `data_start`.
pub fn walk_stars(bytes: &[u8], data_start: usize, star_count: usize) -> Result<Vec<StarBoundary>> {
    let mut r = ByteCursor::at(bytes, data_start)?;
    let mut stars = Vec::with_capacity(star_count);
    for star in 0..star_count {
        stars.push(skip_star(&mut r, star)?);
    }
    tracing::debug!(
        data_start,
        data_end = r.position(),
        stars = star_count,
        hives = stars.iter().map(|s| s.hive_count).sum::<usize>(),
        "walked hive collection"
    );
    Ok(stars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::HiveRecordBuilder;
    use crate::schema::fixed_width;

    #[test]
    fn table_widths() {
        assert_eq!(
            fixed_width(PATTERN_BUILDER, 0),
            Some(PATTERN_BUILDER_WIDTH)
        );
        assert_eq!(fixed_width(EVOLVE_DATA, 0), Some(68));
        assert_eq!(fixed_width(HIVE_STATE, 0), Some(40));
        assert_eq!(fixed_width(HIVE_STATE, 1), Some(48));
        assert_eq!(fixed_width(HIVE_STATE, 2), Some(44));
        assert_eq!(fixed_width(HIVE_STATE, 3), Some(48));
    }

    #[test]
    fn skips_record_for_each_version() {
        for version in [0, 1, 2, 3, 5] {
            let body = HiveRecordBuilder::new(version).builders(3).build_body();
            let mut padded = body.clone();
            padded.extend_from_slice(&[0xEE; 8]);
            let mut r = ByteCursor::new(&padded);
            assert_eq!(skip_hive_record(&mut r).unwrap(), body.len(), "version {version}");
        }
    }

    #[test]
    fn skips_idle_id_payloads() {
        let body = HiveRecordBuilder::new(3).idle_ids(&[4, 5, 6], &[9]).build_body();
        let mut r = ByteCursor::new(&body);
        assert_eq!(skip_hive_record(&mut r).unwrap(), body.len());
    }

    #[test]
    fn rejects_unknown_version() {
        let body = HiveRecordBuilder::new(42).build_body();
        let err = skip_hive_record(&mut ByteCursor::new(&body)).unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 0, .. }));
    }

    #[test]
    fn rejects_impossible_builder_count() {
        let mut body = HiveRecordBuilder::new(2).build_body();
        // builder count sits after version and the three ids
        body[16..20].copy_from_slice(&1_000_000i32.to_le_bytes());
        let err = skip_hive_record(&mut ByteCursor::new(&body)).unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 16, .. }));
    }

    #[test]
    fn negative_pool_cursor_is_structural() {
        let words: Vec<u8> = [8i32, -3, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let err = skip_pool_header(&mut ByteCursor::new(&words)).unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 4, .. }));

        let ok: Vec<u8> = [8i32, 1, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut r = ByteCursor::new(&ok);
        skip_pool_header(&mut r).unwrap();
        assert_eq!(r.position(), 12);
    }

    #[test]
    fn truncated_record_fails() {
        let mut body = HiveRecordBuilder::new(2).build_body();
        body.truncate(body.len() - 1);
        assert!(matches!(
            skip_hive_record(&mut ByteCursor::new(&body)),
            Err(SaveError::Truncated { .. })
        ));
    }

    #[test]
    fn walks_stars_with_mixed_hive_counts() {
        let record = HiveRecordBuilder::new(3).builders(1).build_record();
        let mut data = Vec::new();
        // star 0: two hives
        data.extend_from_slice(&record);
        data.extend_from_slice(&record);
        data.extend_from_slice(&0i32.to_le_bytes());
        // star 1: none
        data.extend_from_slice(&0i32.to_le_bytes());
        // star 2: one
        data.extend_from_slice(&record);
        data.extend_from_slice(&0i32.to_le_bytes());

        let stars = walk_stars(&data, 0, 3).unwrap();
        assert_eq!(stars.len(), 3);
        assert_eq!(stars[0].hive_count, 2);
        assert_eq!(stars[0].range, ByteRange::new(0, record.len() * 2 + 4));
        assert!(stars[1].is_bare_sentinel());
        assert_eq!(stars[2].hive_count, 1);
        assert_eq!(stars[2].range.end, data.len());
    }

    #[test]
    fn non_sentinel_terminator_is_structural() {
        let data = 7i32.to_le_bytes();
        let err = walk_stars(&data, 0, 1).unwrap_err();
        assert!(matches!(err, SaveError::StructuralAssumption { offset: 0, .. }));
    }

    #[test]
    fn running_off_the_end_is_truncated() {
        let data = 0i32.to_le_bytes();
        assert!(matches!(
            walk_stars(&data, 0, 2),
            Err(SaveError::Truncated { .. })
        ));
    }
}
