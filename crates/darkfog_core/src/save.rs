use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::combat::CombatSettings;
use crate::error::{Result, SaveError};
use crate::header::FieldTable;
use crate::locator::{LocateStrategy, LocatedRegion, LocatorConfig, locate};
use crate::mode::{GameMode, set_mode};
use crate::splice::{HiveSource, SpliceStats, splice};
use crate::summary::{HiveSummary, SaveSummary};

/// A loaded save image and the header table decoded from it.
#[derive(Debug, Clone)]
pub struct SaveFile {
    bytes: Vec<u8>,
    table: FieldTable,
}

impl SaveFile {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let table = FieldTable::decode(&bytes)?;
        Ok(Self { bytes, table })
    }

    pub fn parse<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn fields(&self) -> &FieldTable {
        &self.table
    }

    pub fn mode(&self) -> GameMode {
        if self.table.is_peace_mode() {
            GameMode::Peace
        } else {
            GameMode::DarkFog
        }
    }

    pub fn is_peace_mode(&self) -> bool {
        self.table.is_peace_mode()
    }

    pub fn is_sandbox(&self) -> bool {
        self.table.is_sandbox()
    }

    pub fn file_size_consistent(&self) -> bool {
        usize::try_from(self.table.file_size).is_ok_and(|size| size == self.bytes.len())
    }

    pub fn locate_hives(&self) -> Result<LocatedRegion> {
        self.locate_hives_with(&LocatorConfig::default())
    }

    pub fn locate_hives_with(&self, config: &LocatorConfig) -> Result<LocatedRegion> {
        locate(&self.bytes, &self.table, config)
    }

    /// Per-star hive bytes of this save, for splicing into another one.
    pub fn hive_source(&self) -> Result<HiveSource<'_>> {
        let located = self.locate_hives()?;
        if located.strategy != LocateStrategy::Anchor {
            return Err(SaveError::RegionNotFound(
                "save holds no hive collection to copy from".to_string(),
            ));
        }
        HiveSource::new(&self.bytes, self.table.star_count, located.stars)
    }

    /// The count and every star's records, in the live-export layout.
    pub fn extract_hive_region(&self) -> Result<Vec<u8>> {
        let located = self.locate_hives()?;
        Ok(located.region.span().slice(&self.bytes)?.to_vec())
    }

    /// Clear both peace flags and optionally overwrite the combat settings,
    /// in place. A save already in dark fog mode is left untouched. Returns
    /// whether anything changed.
    pub fn convert_to_dark_fog(&mut self, settings: Option<&CombatSettings>) -> Result<bool> {
        if !self.is_peace_mode() {
            tracing::info!("save already in dark fog mode; nothing to convert");
            return Ok(false);
        }

        let mut bytes = self.bytes.clone();
        set_mode(&mut bytes, &self.table, GameMode::DarkFog)?;
        if let Some(settings) = settings {
            settings.write_into(&mut bytes, self.table.combat_offset)?;
        }

        self.table = FieldTable::decode(&bytes)?;
        self.bytes = bytes;
        tracing::info!(
            header_peace_offset = self.table.header_peace.offset,
            desc_peace_offset = self.table.desc_peace.offset,
            combat_rewritten = settings.is_some(),
            "converted save to dark fog mode"
        );
        Ok(true)
    }

    pub fn set_mode(&mut self, mode: GameMode) -> Result<()> {
        set_mode(&mut self.bytes, &self.table, mode)?;
        self.table.header_peace.value = mode == GameMode::Peace;
        self.table.desc_peace.value = mode == GameMode::Peace;
        Ok(())
    }

    /// A copy of this save with its hive collection replaced by `source`.
    pub fn inject_from(
        &self,
        source: &HiveSource<'_>,
        omit: &BTreeSet<usize>,
    ) -> Result<(SaveFile, SpliceStats)> {
        let located = self.locate_hives()?;
        let (bytes, stats) = splice(source, &self.bytes, &self.table, &located.region, omit)?;
        Ok((SaveFile::from_bytes(bytes)?, stats))
    }

    pub fn summary(&self) -> SaveSummary {
        let t = &self.table;
        let hives = match self.locate_hives() {
            Ok(located) => HiveSummary::from_located(&located),
            Err(e) => HiveSummary::Unavailable {
                reason: e.to_string(),
            },
        };
        SaveSummary {
            game_name: t.game_name.clone(),
            game_version: t.game_version.to_string(),
            file_size: t.file_size,
            file_len: self.bytes.len(),
            galaxy_seed: t.galaxy_seed,
            star_count: t.star_count,
            resource_multiplier: t.resource_multiplier,
            mode: self.mode(),
            sandbox: self.is_sandbox(),
            header_peace: t.header_peace,
            desc_peace: t.desc_peace,
            combat_offset: t.combat_offset,
            combat: t.combat,
            hives,
        }
    }
}

/// Whether star indices mean the same thing in two saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compatibility {
    Identical,
    SeedMismatch { source: i32, target: i32 },
    StarCountMismatch { source: usize, target: usize },
}

impl Compatibility {
    pub fn between(source: &FieldTable, target: &FieldTable) -> Self {
        Self::check(Some(source.galaxy_seed), source.star_count, target)
    }

    /// `source_seed` is `None` when the source carries no galaxy descriptor,
    /// as with a live export.
    pub fn check(source_seed: Option<i32>, source_stars: usize, target: &FieldTable) -> Self {
        if source_stars != target.star_count {
            return Self::StarCountMismatch {
                source: source_stars,
                target: target.star_count,
            };
        }
        match source_seed {
            Some(seed) if seed != target.galaxy_seed => Self::SeedMismatch {
                source: seed,
                target: target.galaxy_seed,
            },
            _ => Self::Identical,
        }
    }

    pub fn is_compatible(&self) -> bool {
        matches!(self, Self::Identical)
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Identical => f.write_str("galaxy configuration matches"),
            Self::SeedMismatch { source, target } => write!(
                f,
                "same star count but different galaxy seed (source {source}, target {target})"
            ),
            Self::StarCountMismatch { source, target } => write!(
                f,
                "different galaxy configuration: source has {source} stars, target {target}"
            ),
        }
    }
}
