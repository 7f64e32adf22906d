use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResultRejected;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(EntryId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    NeedsAttention,
    Unhealthy,
}

impl HealthStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::NeedsAttention => "Needs Attention",
            Self::Unhealthy => "Unhealthy",
        }
    }
}

/// Output of the classification call.
///
/// `care_tips` may be absent on the wire and is then empty; `health_status`
/// is required and must be one of the three known values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub species: String,
    pub confidence: f64,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub care_tips: Vec<String>,
}

impl IdentificationResult {
    pub fn validate(&self) -> Result<(), ResultRejected> {
        if self.species.trim().is_empty() {
            return Err(ResultRejected::EmptySpecies);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ResultRejected::ConfidenceOutOfRange(self.confidence));
        }
        Ok(())
    }

    /// Species text before any parenthesised botanical name.
    pub fn common_name(&self) -> &str {
        self.species
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: EntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub plant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flower_species: Option<String>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}
