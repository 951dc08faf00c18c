//! Conversation Binder — maps a match to its two-party message thread and
//! authorizes exchange strictly between the two reporters.
//!
//! Messages are append-only: inserted on send, read-flag updates aside they
//! are never mutated, never deleted.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::items::store::get_item;
use crate::matching::lifecycle;
use crate::models::item::ItemRow;
use crate::models::matching::MatchStatus;
use crate::models::message::MessageRow;
use crate::notify::{emit, NotificationIntent, NotificationSink};

/// Resolves the recipient for `sender` on a match conversation: the reporter
/// on the opposite side. Fails with an authorization error when the sender
/// reports neither bound item.
pub fn resolve_recipient(lost: &ItemRow, found: &ItemRow, sender: Uuid) -> Result<Uuid, AppError> {
    if sender == lost.reported_by {
        Ok(found.reported_by)
    } else if sender == found.reported_by {
        Ok(lost.reported_by)
    } else {
        Err(AppError::Forbidden)
    }
}

/// Sends a message on a match. The first successful send on a pending match
/// confirms it; a rejected match refuses messages. Message insert and match
/// confirmation commit atomically.
pub async fn send(
    pool: &PgPool,
    notifier: &dyn NotificationSink,
    match_id: Uuid,
    sender: Uuid,
    content: &str,
) -> Result<MessageRow, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }

    let bound = lifecycle::get_match(pool, match_id).await?;
    if bound.status == MatchStatus::Rejected {
        return Err(AppError::Conflict(
            "Cannot message on a rejected match".to_string(),
        ));
    }

    let lost = get_item(pool, bound.lost_item_id).await?;
    let found = get_item(pool, bound.found_item_id).await?;
    let recipient = resolve_recipient(&lost, &found, sender)?;

    let mut tx = pool.begin().await?;

    let message: MessageRow = sqlx::query_as(
        r#"
        INSERT INTO messages
            (id, match_id, lost_item_id, found_item_id, from_user_id, to_user_id, content)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(bound.id)
    .bind(bound.lost_item_id)
    .bind(bound.found_item_id)
    .bind(sender)
    .bind(recipient)
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    // A conflict here (concurrent rejection) rolls the insert back with the
    // transaction.
    let status = lifecycle::confirm_on_message(&mut tx, &bound).await?;

    tx.commit().await?;

    if bound.status == MatchStatus::Pending && status == MatchStatus::Confirmed {
        info!("Match {} confirmed by first message", bound.id);
    }

    emit(
        notifier,
        NotificationIntent::MessageReceived {
            message_id: message.id,
            match_id: bound.id,
            from_user_id: sender,
            to_user_id: recipient,
        },
    )
    .await;

    Ok(message)
}

/// All messages the user participates in, chronological, oldest first.
/// Messages of matches the caller is not party to never surface, guessed ids
/// or not.
pub async fn list_for(pool: &PgPool, user_id: Uuid) -> Result<Vec<MessageRow>, AppError> {
    Ok(sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages
         WHERE from_user_id = $1 OR to_user_id = $1
         ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Marks a message read. Recipient-only; a wrong user gets the same
/// not-found as a wrong id.
pub async fn mark_read(pool: &PgPool, message_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let updated = sqlx::query("UPDATE messages SET read = TRUE WHERE id = $1 AND to_user_id = $2")
        .bind(message_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Message {message_id} not found"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{ItemStatus, ItemType};
    use chrono::{NaiveDate, Utc};

    fn make_item(item_type: ItemType, reported_by: Uuid) -> ItemRow {
        ItemRow {
            id: Uuid::new_v4(),
            item_type,
            title: "test".to_string(),
            description: "test".to_string(),
            category: "bag".to_string(),
            location: "cafeteria".to_string(),
            image_url: None,
            date_reported: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: ItemStatus::Matched,
            reported_by,
            reporter_name: None,
            reporter_roll_no: None,
            reporter_institution: None,
            analysis: None,
            version: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lost_reporter_messages_found_reporter() {
        let loser = Uuid::new_v4();
        let finder = Uuid::new_v4();
        let lost = make_item(ItemType::Lost, loser);
        let found = make_item(ItemType::Found, finder);
        assert_eq!(resolve_recipient(&lost, &found, loser).unwrap(), finder);
    }

    #[test]
    fn test_found_reporter_messages_lost_reporter() {
        let loser = Uuid::new_v4();
        let finder = Uuid::new_v4();
        let lost = make_item(ItemType::Lost, loser);
        let found = make_item(ItemType::Found, finder);
        assert_eq!(resolve_recipient(&lost, &found, finder).unwrap(), loser);
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let lost = make_item(ItemType::Lost, Uuid::new_v4());
        let found = make_item(ItemType::Found, Uuid::new_v4());
        let stranger = Uuid::new_v4();
        assert!(matches!(
            resolve_recipient(&lost, &found, stranger),
            Err(AppError::Forbidden)
        ));
    }
}
