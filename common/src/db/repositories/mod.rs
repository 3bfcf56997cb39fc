// Repository layer for the read-only lookups the scheduler performs

pub mod asset;
pub mod mission;
pub mod queries;

pub use asset::{AssetLookup, PgAssetRepository};
pub use mission::{MissionRepository, PgMissionRepository};
