use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SaveError};
use crate::reader::patch_at;
use crate::schema::{FieldKind, FieldSpec};

pub const COMBAT_VALUE_COUNT: usize = 9;

/// Version int32 plus nine floats.
pub const COMBAT_BLOCK_WIDTH: usize = 4 + COMBAT_VALUE_COUNT * 4;

pub(crate) const COMBAT_SETTINGS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("aggressiveness", FieldKind::F32),
    FieldSpec::new("initial_level", FieldKind::F32),
    FieldSpec::new("initial_growth", FieldKind::F32),
    FieldSpec::new("initial_colonize", FieldKind::F32),
    FieldSpec::new("max_density", FieldKind::F32),
    FieldSpec::new("growth_speed", FieldKind::F32),
    FieldSpec::new("power_threat", FieldKind::F32),
    FieldSpec::new("battle_threat", FieldKind::F32),
    FieldSpec::new("battle_exp", FieldKind::F32),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatSettings {
    pub aggressiveness: f32,
    pub initial_level: f32,
    pub initial_growth: f32,
    pub initial_colonize: f32,
    pub max_density: f32,
    pub growth_speed: f32,
    pub power_threat: f32,
    pub battle_threat: f32,
    pub battle_exp: f32,
}

impl CombatSettings {
    pub fn from_array(v: [f32; COMBAT_VALUE_COUNT]) -> Self {
        Self {
            aggressiveness: v[0],
            initial_level: v[1],
            initial_growth: v[2],
            initial_colonize: v[3],
            max_density: v[4],
            growth_speed: v[5],
            power_threat: v[6],
            battle_threat: v[7],
            battle_exp: v[8],
        }
    }

    pub fn to_array(&self) -> [f32; COMBAT_VALUE_COUNT] {
        [
            self.aggressiveness,
            self.initial_level,
            self.initial_growth,
            self.initial_colonize,
            self.max_density,
            self.growth_speed,
            self.power_threat,
            self.battle_threat,
            self.battle_exp,
        ]
    }

    /// Overwrite the nine floats of the block starting at `block_offset`,
    /// leaving its version field untouched.
    pub fn write_into(&self, buf: &mut [u8], block_offset: usize) -> Result<()> {
        let mut raw = [0u8; COMBAT_VALUE_COUNT * 4];
        for (chunk, value) in raw.chunks_exact_mut(4).zip(self.to_array()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        patch_at(buf, block_offset + 4, &raw, "combat settings")
    }

    pub fn aggressiveness_label(&self) -> &'static str {
        match self.aggressiveness {
            a if a < 0.0 => "Dummy",
            a if a < 1.0 => "Passive",
            a if a < 2.0 => "Torpid",
            a if a < 3.0 => "Normal",
            a if a < 4.0 => "Sharp",
            _ => "Rampage",
        }
    }
}

/// Named presets for the convert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    Normal,
    High,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Low, Self::Normal, Self::High];

    pub fn settings(self) -> CombatSettings {
        match self {
            Self::Low => CombatSettings::from_array([0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 1.0]),
            Self::Normal => {
                CombatSettings::from_array([2.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0])
            }
            Self::High => CombatSettings::from_array([4.0, 3.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Low => "passive: dark fog never attacks first",
            Self::Normal => "default difficulty",
            Self::High => "rampage: dark fog is highly aggressive",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = SaveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                SaveError::InvalidInput(format!(
                    "unknown difficulty {s:?}, expected one of low, normal, high"
                ))
            })
    }
}
