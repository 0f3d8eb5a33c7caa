use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use hl_core::{ArticleQuery, Sentiment, StoredArticle};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use crate::AppState;

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(hl_core::Error),
}

impl From<hl_core::Error> for ApiError {
    fn from(e: hl_core::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, Json(json!({ "detail": message }))).into_response(),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, Json(json!({ "detail": message }))).into_response(),
            Self::Internal(e) => {
                warn!("Internal server error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "Internal Server Error" }))).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticlesParams {
    pub start_date: String,
    pub end_date: String,
    pub sentiment: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub article_id: i64,
    pub corrected_sentiment: i64,
}

fn day_bound(raw: &str, offset: &FixedOffset, (h, m, s): (u32, u32, u32)) -> Result<DateTime<FixedOffset>, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(h, m, s))
        .and_then(|local| offset.from_local_datetime(&local).single())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date {:?}, expected YYYY-MM-DD", raw)))
}

fn label(value: i64) -> Result<Sentiment, ApiError> {
    Sentiment::try_from(value).map_err(|_| ApiError::BadRequest(format!("sentiment must be 0, 1 or 2, got {}", value)))
}

/// Articles published within the given days, newest first.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticlesParams>,
) -> Result<Json<Vec<StoredArticle>>, ApiError> {
    let query = ArticleQuery {
        start: day_bound(&params.start_date, &state.offset, (0, 0, 0))?,
        end: day_bound(&params.end_date, &state.offset, (23, 59, 59))?,
        sentiment: params.sentiment.map(label).transpose()?,
    };

    let mut articles = state.store.list_articles(&query).await?;
    for article in &mut articles {
        article.publication_timestamp = article.publication_timestamp.map(|t| t.with_timezone(&state.offset));
    }
    info!("📰 Fetched {} articles", articles.len());
    Ok(Json(articles))
}

/// One CSV line: `id,label,"title",timestamp`. Commas in the title become
/// spaces and quotes are doubled.
pub fn feedback_line(article_id: i64, sentiment: Sentiment, title: &str, at: DateTime<Utc>) -> String {
    let title = title.replace(',', " ").replace('"', "\"\"");
    format!("{},{},\"{}\",{}\n", article_id, sentiment.as_i64(), title, at.to_rfc3339())
}

/// Appends a sentiment correction to the feedback log.
pub async fn post_feedback(
    State(state): State<Arc<AppState>>,
    Json(feedback): Json<FeedbackRequest>,
) -> Result<Json<Value>, ApiError> {
    info!("Received feedback for article {}", feedback.article_id);
    let sentiment = label(feedback.corrected_sentiment)?;
    let title = state
        .store
        .article_title(feedback.article_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    let line = feedback_line(feedback.article_id, sentiment, &title, Utc::now());

    let _lock = state.feedback_lock.lock().await;
    let path = state.feedback_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    info!("✍️ Feedback recorded for article {}", feedback.article_id);
    Ok(Json(json!({ "message": "Feedback recorded" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_line_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 4, 30, 0).unwrap();
        let line = feedback_line(7, Sentiment::Negative, "Rates, taxes and \"reform\"", at);
        assert_eq!(line, "7,0,\"Rates  taxes and \"\"reform\"\"\",2024-03-01T04:30:00+00:00\n");
    }

    #[test]
    fn test_day_bounds_use_offset() {
        let ist = FixedOffset::east_opt(19_800).unwrap();
        let start = day_bound("2024-03-01", &ist, (0, 0, 0)).ok().unwrap();
        let end = day_bound("2024-03-01", &ist, (23, 59, 59)).ok().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+05:30");
        assert_eq!(end.to_rfc3339(), "2024-03-01T23:59:59+05:30");
        assert!(day_bound("01/03/2024", &ist, (0, 0, 0)).is_err());
    }
}
