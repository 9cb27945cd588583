use stratus_lib::ids;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// json rendering of a file or directory node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ids::NodeId,
    pub name: String,
    pub path: String,
    pub mime_type: String,
    pub size: u64,
    pub is_directory: bool,
    pub parent_id: Option<ids::NodeId>,
    pub owner_id: ids::OwnerId,
    pub checksum: String,
    pub version: u32,
    pub is_trashed: bool,
    pub trashed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub file_id: ids::NodeId,
    pub version: u32,
    pub size: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Listing {
    pub files: Vec<Item>,
    pub total_count: u64,
    pub path: String,
    pub current_parent_id: Option<ids::NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Contents {
    pub files: Vec<Item>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFolder {
    pub name: String,
    pub parent_id: Option<ids::NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Rename {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Move {
    pub destination_id: Option<ids::NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Copy {
    pub destination_id: Option<ids::NodeId>,
    #[serde(default)]
    pub new_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Purged {
    pub purged: u64,
    pub freed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Usage {
    pub used_space: u64,
    pub quota: u64,
    pub file_count: u64,
    pub folder_count: u64,
    pub percentage: f64,
}

impl Usage {
    pub fn percentage_of(used_space: u64, quota: u64) -> f64 {
        if quota == 0 {
            0.0
        } else {
            used_space as f64 / quota as f64 * 100.0
        }
    }
}
