//! Item store access — the narrow read/write surface the engine holds over
//! item records. Status flips live in `matching::lifecycle`, never here.

use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::item::{Analysis, ItemRow, ItemStatus, ItemType};

pub struct NewItem {
    pub id: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub image_url: Option<String>,
    pub date_reported: NaiveDate,
    pub reported_by: Uuid,
    pub reporter_name: Option<String>,
    pub reporter_roll_no: Option<String>,
    pub reporter_institution: Option<String>,
    pub analysis: Option<Analysis>,
}

/// Inserts a freshly reported item as `active`. Analysis (when present) is
/// attached here, once — it is immutable afterwards.
pub async fn insert_item(pool: &PgPool, new: NewItem) -> Result<ItemRow, AppError> {
    Ok(sqlx::query_as::<_, ItemRow>(
        r#"
        INSERT INTO items
            (id, item_type, title, description, category, location, image_url,
             date_reported, status, reported_by, reporter_name, reporter_roll_no,
             reporter_institution, analysis, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9, $10, $11, $12, $13, 0)
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.item_type)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.category)
    .bind(&new.location)
    .bind(&new.image_url)
    .bind(new.date_reported)
    .bind(new.reported_by)
    .bind(&new.reporter_name)
    .bind(&new.reporter_roll_no)
    .bind(&new.reporter_institution)
    .bind(new.analysis.map(Json))
    .fetch_one(pool)
    .await?)
}

pub async fn get_item(pool: &PgPool, id: Uuid) -> Result<ItemRow, AppError> {
    let item: Option<ItemRow> = sqlx::query_as("SELECT * FROM items WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    item.ok_or_else(|| AppError::NotFound(format!("Item {id} not found")))
}

#[derive(Debug, Default)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub status: Option<ItemStatus>,
    pub user_id: Option<Uuid>,
}

/// Lists items newest first. Deleted items never surface in listings; they
/// stay in the store as audit trail only.
pub async fn list_items(pool: &PgPool, filter: ItemFilter) -> Result<Vec<ItemRow>, AppError> {
    Ok(sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT * FROM items
        WHERE ($1::text IS NULL OR item_type = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::uuid IS NULL OR reported_by = $3)
          AND status <> 'deleted'
        ORDER BY created_at DESC
        "#,
    )
    .bind(filter.item_type)
    .bind(filter.status)
    .bind(filter.user_id)
    .fetch_all(pool)
    .await?)
}
