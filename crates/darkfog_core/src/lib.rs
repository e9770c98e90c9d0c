pub mod combat;
pub mod error;
pub mod header;
pub mod hive;
pub mod layout;
pub mod locator;
pub mod mode;
pub mod reader;
pub mod save;
pub mod schema;
pub mod splice;
pub mod summary;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixture;

pub use combat::{CombatSettings, Difficulty};
pub use error::{ErrorCode, Result, SaveError};
pub use header::FieldTable;
pub use layout::{ByteRange, HiveRegion, StarBoundary};
pub use locator::{LocateStrategy, LocatedRegion, LocatorConfig};
pub use mode::GameMode;
pub use save::{Compatibility, SaveFile};
pub use splice::{HiveSource, SpliceStats};
pub use summary::{HiveSummary, SaveSummary};
