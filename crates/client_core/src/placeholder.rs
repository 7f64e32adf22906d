//! Deterministic stand-ins used by [`FailurePolicy::Placeholder`].
//!
//! [`FailurePolicy::Placeholder`]: crate::settings::FailurePolicy::Placeholder

use shared::domain::{DiaryEntry, EntryId, HealthStatus, IdentificationResult};

pub fn placeholder_result() -> IdentificationResult {
    IdentificationResult {
        species: "Pink Rose (Rosa)".into(),
        confidence: 0.94,
        health_status: HealthStatus::Healthy,
        care_tips: vec![
            "Roses thrive in full sun and well-drained soil".into(),
            "Water at the base to prevent leaf diseases".into(),
            "Prune in early spring for better growth".into(),
            "Apply organic mulch around the plant".into(),
        ],
    }
}

pub fn placeholder_diary_entries() -> Vec<DiaryEntry> {
    vec![
        DiaryEntry {
            id: EntryId("1".into()),
            user_id: None,
            plant_name: "Garden Rose".into(),
            flower_species: Some("Pink Rose (Rosa)".into()),
            notes: "Found this beautiful rose in my garden today. It seems to be thriving!".into(),
            image_url: Some(
                "https://images.unsplash.com/photo-1586968193404-e89094ffd8b2?auto=format&fit=crop&w=500&q=80"
                    .into(),
            ),
            created_at: "2023-11-15T09:30:00".into(),
        },
        DiaryEntry {
            id: EntryId("2".into()),
            user_id: None,
            plant_name: "Balcony Sunflower".into(),
            flower_species: Some("Yellow Sunflower (Helianthus annuus)".into()),
            notes: "My sunflowers are growing well on the balcony. They need a lot of water during summer."
                .into(),
            image_url: Some(
                "https://images.unsplash.com/photo-1597848212624-a19eb35e2651?auto=format&fit=crop&w=500&q=80"
                    .into(),
            ),
            created_at: "2023-11-10T14:45:00".into(),
        },
    ]
}
