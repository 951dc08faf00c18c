//! Axum route handlers for the Item API.
//!
//! Submission is the engine's entry point: parse the multipart report, run
//! feature extraction, store the item, then scan and promote. Analyzer or
//! photo-store trouble degrades the report (no analysis / no photo) instead
//! of failing it; only the database is fatal here.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::items::store::{self, ItemFilter, NewItem};
use crate::matching::{lifecycle, scanner};
use crate::models::item::{Analysis, ItemRow, ItemStatus, ItemType};
use crate::models::matching::MatchRow;
use crate::state::AppState;

#[derive(Debug)]
struct UploadedPhoto {
    file_name: String,
    content_type: String,
    data: Bytes,
}

#[derive(Debug, Default)]
struct SubmitFields {
    item_type: Option<ItemType>,
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    location: Option<String>,
    date_reported: Option<NaiveDate>,
    reported_by: Option<Uuid>,
    reporter_name: Option<String>,
    reporter_roll_no: Option<String>,
    reporter_institution: Option<String>,
    photo: Option<UploadedPhoto>,
}

// Field names accept both the camelCase the web client sends and snake_case.
async fn collect_fields(multipart: &mut Multipart) -> Result<SubmitFields, AppError> {
    let mut fields = SubmitFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read image: {e}")))?;
            fields.photo = Some(UploadedPhoto {
                file_name,
                content_type,
                data,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
        match name.as_str() {
            "type" => fields.item_type = Some(parse_item_type(&value)?),
            "title" => fields.title = Some(value),
            "description" => fields.description = Some(value),
            "category" => fields.category = Some(value),
            "location" => fields.location = Some(value),
            "dateReported" | "date_reported" => {
                let parsed = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                    AppError::Validation("dateReported must be formatted YYYY-MM-DD".to_string())
                })?;
                fields.date_reported = Some(parsed);
            }
            "reportedBy" | "reported_by" => {
                let parsed = Uuid::parse_str(value.trim()).map_err(|_| {
                    AppError::Validation("reportedBy must be a valid UUID".to_string())
                })?;
                fields.reported_by = Some(parsed);
            }
            "reporterName" | "reporter_name" => fields.reporter_name = Some(value),
            "reporterRollNo" | "reporter_roll_no" => fields.reporter_roll_no = Some(value),
            "reporterInstitution" | "reporter_institution" => {
                fields.reporter_institution = Some(value)
            }
            _ => {} // unknown form fields are ignored
        }
    }

    Ok(fields)
}

fn parse_item_type(value: &str) -> Result<ItemType, AppError> {
    match value.trim() {
        "lost" => Ok(ItemType::Lost),
        "found" => Ok(ItemType::Found),
        other => Err(AppError::Validation(format!("Unknown item type '{other}'"))),
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::Validation(format!("'{name}' is required"))),
    }
}

#[derive(Serialize)]
pub struct SubmitItemResponse {
    pub item: ItemRow,
    /// Present when the submission scan immediately promoted a pair.
    #[serde(rename = "match")]
    pub created_match: Option<MatchRow>,
}

/// POST /api/v1/items (multipart)
///
/// Full submission pipeline: parse → analyze → upload photo → insert item →
/// scan → promote the best candidate above threshold.
pub async fn handle_submit_item(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitItemResponse>, AppError> {
    let fields = collect_fields(&mut multipart).await?;

    let item_type = fields
        .item_type
        .ok_or_else(|| AppError::Validation("'type' is required (lost or found)".to_string()))?;
    let reported_by = fields
        .reported_by
        .ok_or_else(|| AppError::Validation("'reportedBy' is required".to_string()))?;
    let title = required(fields.title, "title")?;
    let description = required(fields.description, "description")?;
    let category = required(fields.category, "category")?;
    let location = required(fields.location, "location")?;

    let item_id = Uuid::new_v4();

    // Feature extraction happens strictly before the item becomes active;
    // no lock is held across the analyzer call.
    let mut analysis: Option<Analysis> = None;
    let mut image_url: Option<String> = None;
    if let Some(photo) = &fields.photo {
        match state
            .extractor
            .analyze(&photo.data, &photo.content_type)
            .await
        {
            Ok(result) => {
                info!(
                    "Analyzed item {item_id}: {} (confidence {:.2})",
                    result.item_type, result.confidence
                );
                analysis = Some(result);
            }
            Err(e) => warn!("Image analysis failed for item {item_id}: {e}"),
        }
        match upload_photo(&state, item_id, photo).await {
            Ok(key) => image_url = Some(key),
            Err(e) => warn!("Photo upload failed for item {item_id}: {e}"),
        }
    }

    let item = store::insert_item(
        &state.db,
        NewItem {
            id: item_id,
            item_type,
            title,
            description,
            category,
            location,
            image_url,
            date_reported: fields
                .date_reported
                .unwrap_or_else(|| Utc::now().date_naive()),
            reported_by,
            reporter_name: fields.reporter_name,
            reporter_roll_no: fields.reporter_roll_no,
            reporter_institution: fields.reporter_institution,
            analysis,
        },
    )
    .await?;
    info!(
        "Item {} reported as {:?} in category '{}'",
        item.id, item.item_type, item.category
    );

    let candidates = scanner::scan(&state.db, &item, &state.weights).await?;
    let mut created_match = None;
    for candidate in &candidates {
        if !lifecycle::meets_threshold(candidate.score, state.config.match_threshold) {
            break; // candidates are sorted; nothing further clears the bar
        }
        let (lost, found) = orient(&item, &candidate.item);
        created_match = lifecycle::promote(
            &state.db,
            state.notifier.as_ref(),
            lost,
            found,
            candidate.score,
            state.config.match_threshold,
        )
        .await?;
        if created_match.is_some() {
            break;
        }
    }

    Ok(Json(SubmitItemResponse {
        item,
        created_match,
    }))
}

/// Pairs are always (lost, found) regardless of which side was submitted.
fn orient<'a>(a: &'a ItemRow, b: &'a ItemRow) -> (&'a ItemRow, &'a ItemRow) {
    if a.item_type == ItemType::Lost {
        (a, b)
    } else {
        (b, a)
    }
}

async fn upload_photo(
    state: &AppState,
    item_id: Uuid,
    photo: &UploadedPhoto,
) -> Result<String, AppError> {
    let key = format!("items/{}/{}", item_id, sanitize_file_name(&photo.file_name));
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(photo.data.to_vec()))
        .content_type(&photo.content_type)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;
    Ok(key)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[derive(Deserialize)]
pub struct ItemListQuery {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub status: Option<ItemStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemRow>,
}

/// GET /api/v1/items
pub async fn handle_list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemListQuery>,
) -> Result<Json<ItemListResponse>, AppError> {
    let items = store::list_items(
        &state.db,
        ItemFilter {
            item_type: params.item_type,
            status: params.status,
            user_id: params.user_id,
        },
    )
    .await?;
    Ok(Json(ItemListResponse { items }))
}

/// GET /api/v1/items/:id
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ItemRow>, AppError> {
    Ok(Json(store::get_item(&state.db, item_id).await?))
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// DELETE /api/v1/items/:id?user_id=...
///
/// Owner-only. A live match bound to the item is rejected and the
/// counterpart item re-enters the scan pool.
pub async fn handle_delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    lifecycle::delete_item(&state.db, item_id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_type() {
        assert_eq!(parse_item_type("lost").unwrap(), ItemType::Lost);
        assert_eq!(parse_item_type(" found ").unwrap(), ItemType::Found);
        assert!(parse_item_type("stolen").is_err());
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  ".to_string()), "title").is_err());
        assert!(required(None, "title").is_err());
        assert_eq!(
            required(Some(" Blue Backpack ".to_string()), "title").unwrap(),
            "Blue Backpack"
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("???"), "upload");
    }
}
