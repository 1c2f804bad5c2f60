use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named collection inside the photo database.
///
/// Both partitions share one table layout; only the table name differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Photos of the session currently (or most recently) in progress
    Session,
    /// Every photo of every finished session
    Archive,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Session, Partition::Archive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Session => "session",
            Partition::Archive => "archive",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Partition::Session => "session_photos",
            Partition::Archive => "all_photos",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Partition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Partition::Session),
            "archive" => Ok(Partition::Archive),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Annotation written next to every stored image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    /// Local capture time as rendered on the image
    pub timestamp: String,
    pub location: Option<Coordinates>,
    /// Reverse-geocoded address, or one of the placeholder strings
    pub address: String,
}

/// A stored photo, owned by exactly one partition
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: i64,
    pub image_data: Vec<u8>,
    pub metadata: PhotoMetadata,
    /// Insert time in epoch milliseconds
    pub stored_at: i64,
}

/// Gallery entry: a record without its image bytes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoSummary {
    pub id: i64,
    pub partition: Partition,
    pub metadata: PhotoMetadata,
    pub stored_at: i64,
    pub size_bytes: i64,
}
