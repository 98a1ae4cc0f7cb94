//! Ingestion flow: validate, duplicate-check, extract, persist.
//!
//! One linear pass with no retries and no rollback; the conditional `put` is
//! the only write, so a failure mid-flow leaves nothing behind. Dependencies
//! come in as parameters so tests and handlers wire their own instances.

use crate::{
    error::{IngestError, StoreError},
    store::{SubtitleRecord, SubtitleStore},
    youtube::{SubtitleExtractor, video_id_from_url},
};

/// Raw intake values; validation happens inside [`ingest`].
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub video_id: String,
    pub video_url: String,
    /// Unparsed form value for the problem number.
    pub leetcode_number: String,
}

impl IngestRequest {
    /// Intake via a bare video id (search-result flow).
    pub fn from_video_id(video_id: &str, leetcode_number: &str) -> Self {
        let video_id = video_id.trim().to_owned();
        Self {
            video_url: format!("https://youtu.be/{video_id}"),
            video_id,
            leetcode_number: leetcode_number.trim().to_owned(),
        }
    }

    /// Intake via a full YouTube URL (front-page flow); the id is derived
    /// from the URL up front so unparseable input fails as validation.
    pub fn from_url(video_url: &str, leetcode_number: &str) -> Result<Self, IngestError> {
        let video_id = video_id_from_url(video_url).ok_or_else(|| {
            IngestError::Validation(format!("unrecognized YouTube url: {video_url:?}"))
        })?;
        Ok(Self {
            video_id,
            video_url: video_url.trim().to_owned(),
            leetcode_number: leetcode_number.trim().to_owned(),
        })
    }
}

/// Runs one ingestion attempt end to end and returns the persisted record.
///
/// The pre-check keeps the common duplicate path away from yt-dlp; the
/// conditional insert in `put` is what actually guards against a concurrent
/// insert of the same id.
pub async fn ingest(
    store: &SubtitleStore,
    extractor: &SubtitleExtractor,
    request: IngestRequest,
    problem_bound: i64,
) -> Result<SubtitleRecord, IngestError> {
    let number = validate(&request, problem_bound)?;

    match store.get(&request.video_id).await {
        Ok(Some(_)) => return Err(IngestError::Duplicate(request.video_id)),
        Ok(None) => {}
        Err(err) => return Err(IngestError::Store(err)),
    }

    let worker = extractor.clone();
    let video_id = request.video_id.clone();
    let video_url = request.video_url.clone();
    let subtitle = tokio::task::spawn_blocking(move || worker.extract(&video_id, &video_url))
        .await
        .map_err(|err| IngestError::Extraction(format!("extraction task failed: {err}")))?
        .map_err(|err| IngestError::Extraction(format!("{err:#}")))?;

    let record = SubtitleRecord::new(
        request.video_id,
        number,
        subtitle.title.unwrap_or_default(),
        request.video_url,
        subtitle.text,
    );

    match store.put(&record).await {
        Ok(()) => Ok(record),
        Err(StoreError::Duplicate(id)) => Err(IngestError::Duplicate(id)),
        Err(StoreError::Backend(err)) => Err(IngestError::Store(err)),
    }
}

fn validate(request: &IngestRequest, problem_bound: i64) -> Result<i64, IngestError> {
    if request.video_id.is_empty() {
        return Err(IngestError::Validation("video id must not be empty".into()));
    }
    if request.video_url.is_empty() {
        return Err(IngestError::Validation(
            "video url must not be empty".into(),
        ));
    }
    let number = request.leetcode_number.parse::<i64>().map_err(|_| {
        IngestError::Validation(format!(
            "leetcode number {:?} is not an integer",
            request.leetcode_number
        ))
    })?;
    if !(1..=problem_bound).contains(&number) {
        return Err(IngestError::Validation(format!(
            "leetcode number {number} is outside 1..={problem_bound}"
        )));
    }
    Ok(number)
}
