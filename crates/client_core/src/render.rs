//! Pure view builders for identification results and the diary list.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use shared::domain::{DiaryEntry, HealthStatus, IdentificationResult};

pub const EMPTY_DIARY_MESSAGE: &str = "Your diary is empty. Add your first plant!";
pub const EMPTY_CARE_TIPS_MESSAGE: &str = "No care tips available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(confidence: f64) -> Self {
        if confidence > 0.9 {
            Self::High
        } else if confidence > 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High Confidence",
            Self::Medium => "Medium Confidence",
            Self::Low => "Low Confidence",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            Self::High => Tone::Success,
            Self::Medium => Tone::Warning,
            Self::Low => Tone::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Error,
}

pub fn health_class(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "health-healthy",
        HealthStatus::NeedsAttention => "health-needs-attention",
        HealthStatus::Unhealthy => "health-unhealthy",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub species: String,
    pub confidence: ConfidenceLevel,
    pub confidence_percent: u8,
    pub health_label: &'static str,
    pub health_class: &'static str,
    pub care_tips: Vec<String>,
}

impl ResultView {
    pub fn confidence_label(&self) -> &'static str {
        self.confidence.label()
    }
}

pub fn render_result(result: &IdentificationResult) -> ResultView {
    ResultView {
        species: result.species.clone(),
        confidence: ConfidenceLevel::from_score(result.confidence),
        confidence_percent: (result.confidence.clamp(0.0, 1.0) * 100.0).round() as u8,
        health_label: result.health_status.label(),
        health_class: health_class(result.health_status),
        care_tips: result.care_tips.clone(),
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.species)?;
        writeln!(
            f,
            "  {} ({}%)",
            self.confidence.label(),
            self.confidence_percent
        )?;
        writeln!(f, "  Health: {}", self.health_label)?;
        writeln!(f, "  Care tips:")?;
        if self.care_tips.is_empty() {
            writeln!(f, "    {EMPTY_CARE_TIPS_MESSAGE}")?;
        }
        for tip in &self.care_tips {
            writeln!(f, "    - {tip}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryCard {
    pub title: String,
    pub date: String,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub species: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiaryListView {
    Empty { message: &'static str },
    Cards(Vec<DiaryCard>),
}

impl DiaryListView {
    pub fn cards(&self) -> &[DiaryCard] {
        match self {
            Self::Empty { .. } => &[],
            Self::Cards(cards) => cards,
        }
    }
}

pub fn render_diary(entries: &[DiaryEntry]) -> DiaryListView {
    if entries.is_empty() {
        return DiaryListView::Empty {
            message: EMPTY_DIARY_MESSAGE,
        };
    }

    DiaryListView::Cards(
        entries
            .iter()
            .map(|entry| DiaryCard {
                title: entry.plant_name.clone(),
                date: format_timestamp(&entry.created_at),
                image_url: entry.image_url.clone().filter(|url| !url.is_empty()),
                image_alt: entry.plant_name.clone(),
                species: entry.flower_species.clone().filter(|s| !s.is_empty()),
                notes: entry.notes.clone(),
            })
            .collect(),
    )
}

/// `YYYY-MM-DD HH:MM`, or the raw value when it is not a recognised
/// timestamp.
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M";
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DISPLAY).to_string();
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok())
        .map(|dt| dt.format(DISPLAY).to_string())
        .unwrap_or_else(|| raw.to_string())
}

impl fmt::Display for DiaryListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { message } => writeln!(f, "{message}"),
            Self::Cards(cards) => {
                for card in cards {
                    writeln!(f, "{} [{}]", card.title, card.date)?;
                    if let Some(species) = &card.species {
                        writeln!(f, "  {species}")?;
                    }
                    if let Some(url) = &card.image_url {
                        writeln!(f, "  image: {url}")?;
                    }
                    writeln!(f, "  {}", card.notes)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
