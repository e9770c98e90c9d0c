use serde::{Deserialize, Serialize};

use crate::combat::CombatSettings;
use crate::header::FlagField;
use crate::locator::{LocateStrategy, LocatedRegion};
use crate::mode::GameMode;

/// Everything the analyze command reports about a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub game_name: String,
    pub game_version: String,
    pub file_size: i64,
    pub file_len: usize,
    pub galaxy_seed: i32,
    pub star_count: usize,
    pub resource_multiplier: f32,
    pub mode: GameMode,
    pub sandbox: bool,
    pub header_peace: FlagField,
    pub desc_peace: FlagField,
    pub combat_offset: usize,
    pub combat: CombatSettings,
    pub hives: HiveSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HiveSummary {
    Located {
        strategy: LocateStrategy,
        count_offset: usize,
        data_end: usize,
        size: usize,
        hive_count: usize,
        stars_with_hives: usize,
    },
    Unavailable {
        reason: String,
    },
}

impl HiveSummary {
    pub fn from_located(located: &LocatedRegion) -> Self {
        let span = located.region.span();
        Self::Located {
            strategy: located.strategy,
            count_offset: span.start,
            data_end: span.end,
            size: span.len(),
            hive_count: located.hive_count(),
            stars_with_hives: located.stars.iter().filter(|s| s.hive_count > 0).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::SaveBuilder;
    use crate::save::SaveFile;

    #[test]
    fn summary_serializes_tagged_hive_status() {
        let save = SaveFile::from_bytes(SaveBuilder::new(3).hives_per_star(&[1, 0, 1]).build()).unwrap();
        let value = serde_json::to_value(save.summary()).unwrap();
        assert_eq!(value["mode"], "dark_fog");
        assert_eq!(value["hives"]["status"], "located");
        assert_eq!(value["hives"]["strategy"], "anchor");
        assert_eq!(value["hives"]["hive_count"], 2);
        assert_eq!(value["hives"]["stars_with_hives"], 2);

        let back: SaveSummary = serde_json::from_value(value).unwrap();
        assert_eq!(back, save.summary());
    }

    #[test]
    fn unavailable_keeps_reason() {
        let value = serde_json::to_value(HiveSummary::Unavailable {
            reason: "no magic".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"status": "unavailable", "reason": "no magic"}));
    }
}
