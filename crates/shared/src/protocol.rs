use serde::{Deserialize, Serialize};

use crate::domain::EntryId;

pub const PREDICT_PATH: &str = "predict";
pub const DIARY_PATH: &str = "diary";

pub const PREDICT_FILE_FIELD: &str = "file";
pub const DIARY_USER_ID_FIELD: &str = "user_id";
pub const DIARY_PLANT_NAME_FIELD: &str = "plant_name";
pub const DIARY_NOTES_FIELD: &str = "notes";
pub const DIARY_SPECIES_FIELD: &str = "flower_species";
pub const DIARY_IMAGE_FIELD: &str = "image";

/// Body of a successful `POST /diary`. Every field is optional on read so a
/// bare 2xx still counts as success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDiaryEntryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
}
