use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combat::{COMBAT_SETTINGS_FIELDS, CombatSettings};
use crate::error::{Result, SaveError};
use crate::reader::{ByteCursor, patch_at};
use crate::schema::{DecodedField, FieldKind, FieldSpec, decode_fields, find};

pub const SAVE_MAGIC: &[u8; 6] = b"VFSAVE";
pub const MIN_SAVE_LEN: usize = 20;
pub const FILE_SIZE_OFFSET: usize = 6;

const PREFIX: &str = "prefix";
const ACCOUNT: &str = "account";
const GAME_DATA: &str = "game_data";
const GAME_ACCOUNT: &str = "game_account";
const GAME_NAME: &str = "game_name";
const GAME_DESC: &str = "game_desc";
const COMBAT: &str = "combat";

const PREFIX_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("magic", FieldKind::Bytes(6)),
    FieldSpec::new("file_size", FieldKind::I64),
    FieldSpec::new("header_version", FieldKind::I32),
    FieldSpec::new("is_sandbox", FieldKind::Bool),
    FieldSpec::new("is_peace", FieldKind::Bool),
    FieldSpec::new("major", FieldKind::I32),
    FieldSpec::new("minor", FieldKind::I32),
    FieldSpec::new("release", FieldKind::I32),
    FieldSpec::new("build", FieldKind::I32),
    FieldSpec::new("game_tick", FieldKind::I64),
    FieldSpec::new("save_tick", FieldKind::I64),
    FieldSpec::new("screenshot", FieldKind::Blob),
];

const ACCOUNT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("platform", FieldKind::I32),
    FieldSpec::new("user_id", FieldKind::U64),
    FieldSpec::new("user_name", FieldKind::String7),
    FieldSpec::new("balance", FieldKind::U64),
];

const GAME_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("patch", FieldKind::I32),
];

// The copy nested in the game data carries no balance.
const GAME_ACCOUNT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("platform", FieldKind::I32),
    FieldSpec::new("user_id", FieldKind::U64),
    FieldSpec::new("user_name", FieldKind::String7),
];

const GAME_NAME_FIELDS: &[FieldSpec] = &[FieldSpec::new("name", FieldKind::String7)];

const GAME_DESC_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("creation_tick", FieldKind::I64),
    FieldSpec::new("major", FieldKind::I32),
    FieldSpec::new("minor", FieldKind::I32),
    FieldSpec::new("release", FieldKind::I32),
    FieldSpec::new("build", FieldKind::I32),
    FieldSpec::new("galaxy_algo", FieldKind::I32),
    FieldSpec::new("galaxy_seed", FieldKind::I32),
    FieldSpec::new("star_count", FieldKind::I32),
    FieldSpec::new("player_proto", FieldKind::I32),
    FieldSpec::new("resource_multiplier", FieldKind::F32),
    FieldSpec::new("theme_ids", FieldKind::I32List),
    FieldSpec::new("achievement_enable", FieldKind::Bool),
    FieldSpec::new("is_peace", FieldKind::Bool),
    FieldSpec::new("is_sandbox", FieldKind::Bool),
];

/// Header sections in file order.
pub const HEADER_LAYOUT: &[(&str, &[FieldSpec])] = &[
    (PREFIX, PREFIX_FIELDS),
    (ACCOUNT, ACCOUNT_FIELDS),
    (GAME_DATA, GAME_DATA_FIELDS),
    (GAME_ACCOUNT, GAME_ACCOUNT_FIELDS),
    (GAME_NAME, GAME_NAME_FIELDS),
    (GAME_DESC, GAME_DESC_FIELDS),
    (COMBAT, COMBAT_SETTINGS_FIELDS),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionQuad {
    pub major: i32,
    pub minor: i32,
    pub release: i32,
    pub build: i32,
}

impl fmt::Display for VersionQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.release, self.build
        )
    }
}

/// A boolean byte together with where it lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagField {
    pub offset: usize,
    pub value: bool,
}

/// Decoded header values plus the offsets of every field that gets patched.
///
/// Offsets are only valid for the buffer the table was decoded from. After a
/// splice changes the buffer length, decode a fresh table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTable {
    pub file_size: i64,
    pub header_version: i32,
    pub game_version: VersionQuad,
    pub game_tick: i64,
    pub save_tick: i64,
    pub user_name: String,
    pub game_name: String,
    pub desc_version: VersionQuad,
    pub galaxy_algo: i32,
    pub galaxy_seed: i32,
    pub star_count: usize,
    pub player_proto: i32,
    pub resource_multiplier: f32,
    pub achievements_enabled: bool,
    pub header_sandbox: FlagField,
    pub header_peace: FlagField,
    pub desc_peace: FlagField,
    pub desc_sandbox: FlagField,
    pub combat_offset: usize,
    pub combat_version: i32,
    pub combat: CombatSettings,
    /// First byte after the combat settings block.
    pub header_end: usize,
    fields: Vec<DecodedField>,
}

/// Reject buffers that are not save containers at all.
pub fn check_container(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_SAVE_LEN {
        return Err(SaveError::FormatMismatch(format!(
            "file too small: {} bytes, need at least {MIN_SAVE_LEN}",
            bytes.len()
        )));
    }
    if &bytes[..SAVE_MAGIC.len()] != SAVE_MAGIC {
        return Err(SaveError::FormatMismatch(
            "magic does not match VFSAVE".to_string(),
        ));
    }
    Ok(())
}

impl FieldTable {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_container(bytes)?;

        let mut r = ByteCursor::new(bytes);
        let mut fields = Vec::new();
        for &(section, table) in HEADER_LAYOUT {
            fields.extend(decode_fields(&mut r, section, table, 0)?);
        }
        let header_end = r.position();

        let star_field = find(&fields, GAME_DESC, "star_count")?;
        let raw_stars = expect_i32(star_field)?;
        let star_count = usize::try_from(raw_stars).map_err(|_| {
            SaveError::structural(star_field.offset, format!("negative star count {raw_stars}"))
        })?;

        let combat_offset = find(&fields, COMBAT, "version")?.offset;
        let mut combat_values = [0f32; 9];
        for (slot, spec) in combat_values
            .iter_mut()
            .zip(COMBAT_SETTINGS_FIELDS.iter().skip(1))
        {
            *slot = expect_f32(find(&fields, COMBAT, spec.name)?)?;
        }

        let table = Self {
            file_size: expect_i64(find(&fields, PREFIX, "file_size")?)?,
            header_version: i32_of(&fields, PREFIX, "header_version")?,
            game_version: version_quad(&fields, PREFIX)?,
            game_tick: expect_i64(find(&fields, PREFIX, "game_tick")?)?,
            save_tick: expect_i64(find(&fields, PREFIX, "save_tick")?)?,
            user_name: str_of(&fields, ACCOUNT, "user_name")?,
            game_name: str_of(&fields, GAME_NAME, "name")?,
            desc_version: version_quad(&fields, GAME_DESC)?,
            galaxy_algo: i32_of(&fields, GAME_DESC, "galaxy_algo")?,
            galaxy_seed: i32_of(&fields, GAME_DESC, "galaxy_seed")?,
            star_count,
            player_proto: i32_of(&fields, GAME_DESC, "player_proto")?,
            resource_multiplier: expect_f32(find(&fields, GAME_DESC, "resource_multiplier")?)?,
            achievements_enabled: flag_of(&fields, GAME_DESC, "achievement_enable")?.value,
            header_sandbox: flag_of(&fields, PREFIX, "is_sandbox")?,
            header_peace: flag_of(&fields, PREFIX, "is_peace")?,
            desc_peace: flag_of(&fields, GAME_DESC, "is_peace")?,
            desc_sandbox: flag_of(&fields, GAME_DESC, "is_sandbox")?,
            combat_offset,
            combat_version: i32_of(&fields, COMBAT, "version")?,
            combat: CombatSettings::from_array(combat_values),
            header_end,
            fields,
        };

        tracing::debug!(
            game = %table.game_name,
            version = %table.game_version,
            stars = table.star_count,
            seed = table.galaxy_seed,
            header_peace_offset = table.header_peace.offset,
            desc_peace_offset = table.desc_peace.offset,
            combat_offset = table.combat_offset,
            "decoded save header"
        );

        Ok(table)
    }

    /// Either copy of the flag marks the save as peace mode.
    pub fn is_peace_mode(&self) -> bool {
        self.header_peace.value || self.desc_peace.value
    }

    pub fn is_sandbox(&self) -> bool {
        self.header_sandbox.value || self.desc_sandbox.value
    }

    pub fn peace_offsets(&self) -> [usize; 2] {
        [self.header_peace.offset, self.desc_peace.offset]
    }

    pub fn fields(&self) -> &[DecodedField] {
        &self.fields
    }

    pub fn field(&self, section: &str, name: &str) -> Option<&DecodedField> {
        find(&self.fields, section, name).ok()
    }

    /// Write every kept header value back at its recorded offset.
    pub fn write_back(&self, buf: &mut [u8]) -> Result<()> {
        for field in &self.fields {
            if let Some(bytes) = field.encode() {
                patch_at(buf, field.offset, &bytes, field.name)?;
            }
        }
        Ok(())
    }
}

fn expect_i32(field: &DecodedField) -> Result<i32> {
    field.value.as_i32().ok_or_else(|| mistyped(field))
}

fn expect_i64(field: &DecodedField) -> Result<i64> {
    field.value.as_i64().ok_or_else(|| mistyped(field))
}

fn expect_f32(field: &DecodedField) -> Result<f32> {
    field.value.as_f32().ok_or_else(|| mistyped(field))
}

fn i32_of(fields: &[DecodedField], section: &str, name: &str) -> Result<i32> {
    expect_i32(find(fields, section, name)?)
}

fn str_of(fields: &[DecodedField], section: &str, name: &str) -> Result<String> {
    let field = find(fields, section, name)?;
    field
        .value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| mistyped(field))
}

fn flag_of(fields: &[DecodedField], section: &str, name: &str) -> Result<FlagField> {
    let field = find(fields, section, name)?;
    let value = field.value.as_bool().ok_or_else(|| mistyped(field))?;
    Ok(FlagField {
        offset: field.offset,
        value,
    })
}

fn version_quad(fields: &[DecodedField], section: &str) -> Result<VersionQuad> {
    Ok(VersionQuad {
        major: i32_of(fields, section, "major")?,
        minor: i32_of(fields, section, "minor")?,
        release: i32_of(fields, section, "release")?,
        build: i32_of(fields, section, "build")?,
    })
}

fn mistyped(field: &DecodedField) -> SaveError {
    SaveError::structural(
        field.offset,
        format!(
            "field {}.{} decoded as unexpected type",
            field.section, field.name
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::SaveBuilder;

    #[test]
    fn fixed_prefix_offsets() {
        let bytes = SaveBuilder::new(3).peace_mode(true).build();
        let table = FieldTable::decode(&bytes).unwrap();
        assert_eq!(table.header_sandbox.offset, 18);
        assert_eq!(table.header_peace.offset, 19);
        assert!(table.header_peace.value);
        assert!(table.desc_peace.value);
        assert!(table.is_peace_mode());
        assert_eq!(table.file_size, bytes.len() as i64);
    }

    #[test]
    fn decodes_game_descriptor() {
        let bytes = SaveBuilder::new(64)
            .seed(1234)
            .game_name("Sphere 7")
            .theme_ids(&[1, 8, 22])
            .build();
        let table = FieldTable::decode(&bytes).unwrap();
        assert_eq!(table.star_count, 64);
        assert_eq!(table.galaxy_seed, 1234);
        assert_eq!(table.game_name, "Sphere 7");
        assert!(!table.is_peace_mode());
        assert_eq!(table.desc_sandbox.offset, table.desc_peace.offset + 1);
        assert_eq!(table.combat_offset, table.desc_sandbox.offset + 1);
        assert_eq!(table.header_end, table.combat_offset + 40);
    }

    #[test]
    fn magic_and_length_gate() {
        assert!(matches!(
            FieldTable::decode(&[0u8; 64]),
            Err(SaveError::FormatMismatch(_))
        ));
        assert!(matches!(
            FieldTable::decode(b"VFSAVE"),
            Err(SaveError::FormatMismatch(_))
        ));
    }

    #[test]
    fn truncated_header_is_not_format_mismatch() {
        let mut bytes = SaveBuilder::new(8).build();
        bytes.truncate(40);
        assert!(matches!(
            FieldTable::decode(&bytes),
            Err(SaveError::Truncated { .. })
        ));
    }

    #[test]
    fn negative_star_count_is_structural() {
        let bytes = SaveBuilder::new(0).raw_star_count(-4).build();
        assert!(matches!(
            FieldTable::decode(&bytes),
            Err(SaveError::StructuralAssumption { .. })
        ));
    }
}
