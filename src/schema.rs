//! Schema versioning: the compatibility gate and stored-snapshot migrations.
//!
//! Every payload declares a semantic version. Compatibility is major-version
//! equality only; minor and patch differences are accepted. The gate runs
//! before any state is touched during push processing; on mismatch the
//! caller gets a distinct upgrade-required signal instead of a silent
//! desync.
//!
//! Snapshot migrations are an ordered list of additive, idempotent
//! transforms, each tagged with a target ordinal, applied strictly in order
//! from the stored ordinal to the current one.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The schema version this build speaks.
pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion {
    major: 1,
    minor: 2,
    patch: 0,
};

/// Ordinal of the current snapshot layout, advanced with each migration.
pub const SNAPSHOT_ORDINAL: u32 = 3;

/// A semantic `major.minor.patch` version, serialized as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Major-version equality only; minor/patch differences are accepted.
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '.');
        let mut next = || -> Result<u32, SchemaVersionError> {
            parts
                .next()
                .ok_or_else(|| SchemaVersionError::Malformed(s.to_string()))?
                .parse()
                .map_err(|_| SchemaVersionError::Malformed(s.to_string()))
        };
        Ok(Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        })
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = SchemaVersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(v: SchemaVersion) -> Self {
        v.to_string()
    }
}

/// Errors parsing a schema version string.
#[derive(Debug)]
pub enum SchemaVersionError {
    Malformed(String),
}

impl std::fmt::Display for SchemaVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaVersionError::Malformed(s) => {
                write!(f, "Malformed schema version '{}'", s)
            }
        }
    }
}

impl std::error::Error for SchemaVersionError {}

// ============================================================================
// Snapshot migrations
// ============================================================================

/// An additive, idempotent transform bringing a stored snapshot up to
/// `target`.
pub struct Migration {
    /// Snapshot ordinal this migration produces.
    pub target: u32,
    pub name: &'static str,
    pub apply: fn(&mut serde_json::Value),
}

/// All migrations, in ascending target order. Never reorder or remove an
/// entry once released.
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            target: 2,
            name: "member-belt-rank",
            apply: |snapshot| add_entity_field(snapshot, "member", "beltRank"),
        },
        Migration {
            target: 3,
            name: "equipment-category",
            apply: |snapshot| add_entity_field(snapshot, "equipmentItem", "category"),
        },
    ]
}

/// Backfills a null field on every entity of one type that lacks it.
fn add_entity_field(snapshot: &mut serde_json::Value, list: &str, field: &str) {
    let Some(entities) = snapshot
        .get_mut("entities")
        .and_then(|e| e.get_mut(list))
        .and_then(|l| l.as_array_mut())
    else {
        return;
    };
    for entity in entities {
        if let Some(map) = entity.as_object_mut() {
            map.entry(field).or_insert(serde_json::Value::Null);
        }
    }
}

/// Errors applying snapshot migrations.
#[derive(Debug)]
pub enum MigrationError {
    /// The migration list does not reach the requested ordinal.
    MissingMigration { from: u32, to: u32, reached: u32 },
    /// The migration list is not strictly ascending.
    OutOfOrder { previous: u32, target: u32 },
    /// The stored snapshot is newer than this build.
    SnapshotTooNew { stored: u32, current: u32 },
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::MissingMigration { from, to, reached } => write!(
                f,
                "No migration path from {} to {} (reached {})",
                from, to, reached
            ),
            MigrationError::OutOfOrder { previous, target } => write!(
                f,
                "Migration list out of order: {} after {}",
                target, previous
            ),
            MigrationError::SnapshotTooNew { stored, current } => write!(
                f,
                "Stored snapshot ordinal {} is newer than this build ({})",
                stored, current
            ),
        }
    }
}

impl std::error::Error for MigrationError {}

/// Applies every migration with `from < target <= to`, strictly in order.
///
/// Returns the ordinal reached. Applying to an already-current snapshot is
/// a no-op.
pub fn migrate(
    snapshot: &mut serde_json::Value,
    from: u32,
    to: u32,
) -> Result<u32, MigrationError> {
    if from > to {
        return Err(MigrationError::SnapshotTooNew {
            stored: from,
            current: to,
        });
    }

    let mut reached = from;
    let mut previous = 0;
    for migration in migrations() {
        if migration.target <= previous {
            return Err(MigrationError::OutOfOrder {
                previous,
                target: migration.target,
            });
        }
        previous = migration.target;

        if migration.target > from && migration.target <= to {
            if migration.target != reached + 1 {
                return Err(MigrationError::MissingMigration { from, to, reached });
            }
            tracing::info!(
                "Applying snapshot migration {} -> {}",
                migration.name,
                migration.target
            );
            (migration.apply)(snapshot);
            reached = migration.target;
        }
    }

    if reached != to {
        return Err(MigrationError::MissingMigration { from, to, reached });
    }
    Ok(reached)
}
