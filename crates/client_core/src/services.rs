//! Remote collaborators: the prediction service and the diary store.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use shared::{
    domain::{DiaryEntry, EntryId, IdentificationResult, UserId},
    error::ApiError,
    protocol::{
        CreateDiaryEntryResponse, HealthCheckResponse, DIARY_IMAGE_FIELD, DIARY_NOTES_FIELD,
        DIARY_PATH, DIARY_PLANT_NAME_FIELD, DIARY_SPECIES_FIELD, DIARY_USER_ID_FIELD,
        PREDICT_FILE_FIELD, PREDICT_PATH,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{media::CapturedImage, settings::ClientSettings};

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, image: &CapturedImage) -> Result<IdentificationResult>;
}

#[async_trait]
pub trait DiaryService: Send + Sync {
    async fn list_entries(&self, user_id: &UserId) -> Result<Vec<DiaryEntry>>;
    async fn get_entry(&self, user_id: &UserId, entry_id: &EntryId) -> Result<Option<DiaryEntry>>;
    async fn create_entry(&self, submission: &DiarySubmission) -> Result<CreateDiaryEntryResponse>;
}

/// Fields of a `POST /diary` form.
#[derive(Debug, Clone, PartialEq)]
pub struct DiarySubmission {
    pub user_id: UserId,
    pub plant_name: String,
    pub notes: String,
    pub flower_species: Option<String>,
    pub image: Option<CapturedImage>,
}

/// HTTP client for both services, rooted at the configured API base URL.
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base: settings.api_base()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base url cannot carry a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET /health` on the service root (the base URL without its `api`
    /// segment).
    pub async fn health(&self) -> Result<HealthCheckResponse> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("api base url cannot carry a path: {}", self.base))?;
            segments.pop_if_empty();
            if self.base.path().trim_end_matches('/').ends_with("/api") {
                segments.pop();
            }
            segments.push("health");
        }
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("health check request failed")?;
        let res = ensure_success(res, "health check").await?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl PredictionService for ApiClient {
    async fn predict(&self, image: &CapturedImage) -> Result<IdentificationResult> {
        let url = self.endpoint(&[PREDICT_PATH])?;
        let form = Form::new().part(PREDICT_FILE_FIELD, image_part(image)?);
        debug!(%url, size = image.size(), "submitting image for prediction");

        let res = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("prediction request failed")?;
        let res = ensure_success(res, "prediction").await?;
        let result: IdentificationResult = res
            .json()
            .await
            .context("malformed prediction response")?;
        result.validate()?;
        info!(
            species = %result.species,
            confidence = result.confidence,
            "prediction received"
        );
        Ok(result)
    }
}

#[async_trait]
impl DiaryService for ApiClient {
    async fn list_entries(&self, user_id: &UserId) -> Result<Vec<DiaryEntry>> {
        let url = self.endpoint(&[DIARY_PATH, user_id.as_str()])?;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("diary list request failed")?;
        let res = ensure_success(res, "diary list").await?;
        res.json().await.context("malformed diary list response")
    }

    async fn get_entry(&self, user_id: &UserId, entry_id: &EntryId) -> Result<Option<DiaryEntry>> {
        let url = self.endpoint(&[DIARY_PATH, user_id.as_str(), entry_id.as_str()])?;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("diary entry request failed")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let res = ensure_success(res, "diary entry").await?;
        Ok(Some(
            res.json().await.context("malformed diary entry response")?,
        ))
    }

    async fn create_entry(&self, submission: &DiarySubmission) -> Result<CreateDiaryEntryResponse> {
        let url = self.endpoint(&[DIARY_PATH])?;
        let mut form = Form::new()
            .text(DIARY_USER_ID_FIELD, submission.user_id.0.clone())
            .text(DIARY_PLANT_NAME_FIELD, submission.plant_name.clone())
            .text(DIARY_NOTES_FIELD, submission.notes.clone());
        if let Some(species) = submission
            .flower_species
            .as_ref()
            .filter(|species| !species.is_empty())
        {
            form = form.text(DIARY_SPECIES_FIELD, species.clone());
        }
        if let Some(image) = &submission.image {
            form = form.part(DIARY_IMAGE_FIELD, image_part(image)?);
        }

        let res = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("diary create request failed")?;
        let res = ensure_success(res, "diary create").await?;
        let body = res.bytes().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to read diary create response body");
            Default::default()
        });
        let parsed = serde_json::from_slice::<CreateDiaryEntryResponse>(&body).unwrap_or_else(|err| {
            warn!(error = %err, "diary create returned an unparseable body; treating as success");
            CreateDiaryEntryResponse {
                success: true,
                ..CreateDiaryEntryResponse::default()
            }
        });
        info!(user_id = %submission.user_id, entry_id = ?parsed.entry_id, "diary entry created");
        Ok(parsed)
    }
}

fn image_part(image: &CapturedImage) -> Result<Part> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime_type)
        .with_context(|| format!("invalid image mime type '{}'", image.mime_type))
}

async fn ensure_success(res: Response, operation: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiError>(&body)
        .map(|err| err.detail)
        .unwrap_or(body);
    warn!(operation, status = status.as_u16(), %detail, "service returned an error status");
    if detail.is_empty() {
        Err(anyhow!("{operation} request failed with status {status}"))
    } else {
        Err(anyhow!(
            "{operation} request failed with status {status}: {detail}"
        ))
    }
}

#[cfg(test)]
#[path = "tests/services_tests.rs"]
mod tests;
