use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::header::{FILE_SIZE_OFFSET, FieldTable};
use crate::reader::patch_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    DarkFog,
    Peace,
}

impl GameMode {
    pub fn flag_byte(self) -> u8 {
        match self {
            Self::DarkFog => 0,
            Self::Peace => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DarkFog => "dark fog",
            Self::Peace => "peace",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write one is-peace flag byte.
pub fn set_flag(buf: &mut [u8], offset: usize, mode: GameMode) -> Result<()> {
    patch_at(buf, offset, &[mode.flag_byte()], "peace flag")
}

/// Write both copies of the is-peace flag recorded in `table`.
pub fn set_mode(buf: &mut [u8], table: &FieldTable, mode: GameMode) -> Result<()> {
    for offset in table.peace_offsets() {
        set_flag(buf, offset, mode)?;
    }
    Ok(())
}

/// Rewrite the total-size field to the buffer's current length.
pub fn patch_file_size(buf: &mut [u8]) -> Result<()> {
    let len = buf.len() as i64;
    patch_at(buf, FILE_SIZE_OFFSET, &len.to_le_bytes(), "file size")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::SaveBuilder;

    #[test]
    fn flips_both_flags() {
        let mut bytes = SaveBuilder::new(4).peace_flags(true, false).build();
        let table = FieldTable::decode(&bytes).unwrap();
        set_mode(&mut bytes, &table, GameMode::DarkFog).unwrap();
        assert!(!FieldTable::decode(&bytes).unwrap().is_peace_mode());

        set_mode(&mut bytes, &table, GameMode::Peace).unwrap();
        let again = FieldTable::decode(&bytes).unwrap();
        assert!(again.header_peace.value && again.desc_peace.value);
    }

    #[test]
    fn setting_current_mode_changes_nothing() {
        let original = SaveBuilder::new(4).build();
        let table = FieldTable::decode(&original).unwrap();
        let mut bytes = original.clone();
        set_mode(&mut bytes, &table, GameMode::DarkFog).unwrap();
        assert_eq!(bytes, original);
    }

    #[test]
    fn file_size_tracks_length() {
        let mut bytes = SaveBuilder::new(1).build();
        bytes.extend_from_slice(&[0; 10]);
        patch_file_size(&mut bytes).unwrap();
        assert_eq!(FieldTable::decode(&bytes).unwrap().file_size, bytes.len() as i64);
        assert!(patch_file_size(&mut [0u8; 8]).is_err());
    }
}
