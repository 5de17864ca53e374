use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "PHOTO",
            MediaType::Video => "VIDEO",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PHOTO" => Ok(MediaType::Photo),
            "VIDEO" => Ok(MediaType::Video),
            other => Err(format!("unknown media type `{other}`")),
        }
    }
}

/// Inspection evidence attached to a job and shown on the approval page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionMedia {
    pub id: MediaId,
    pub job_id: JobId,
    pub media_type: MediaType,
    pub url: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewMedia {
    pub media_type: MediaType,
    pub url: String,
    pub caption: Option<String>,
}
