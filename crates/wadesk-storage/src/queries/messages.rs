// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message record operations.
//!
//! Records are keyed by the provider message id. Timestamps are stored as
//! fixed-width RFC 3339 strings so that text ordering matches time ordering.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use wadesk_core::types::{DeliveryStatus, MediaItem, Message, UpsertOutcome};
use wadesk_core::WadeskError;

use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, conversation_id, body, author, created_at, delivery_status, media";

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_status(idx: usize, raw: &str) -> Result<DeliveryStatus, rusqlite::Error> {
    raw.parse::<DeliveryStatus>().map_err(|e| conversion_err(idx, e))
}

fn row_to_message(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let created_at: String = row.get(4)?;
    let status: String = row.get(5)?;
    let media: Option<String> = row.get(6)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_err(4, e))?
        .with_timezone(&Utc);
    let media: Vec<MediaItem> = match media {
        Some(json) => serde_json::from_str(&json).map_err(|e| conversion_err(6, e))?,
        None => Vec::new(),
    };

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        body: row.get(2)?,
        author: row.get(3)?,
        created_at,
        delivery_status: parse_status(5, &status)?,
        media,
    })
}

/// Fetch a single message by provider id.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, WadeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert the message if its id is unknown; otherwise only advance its delivery status.
///
/// Body, author, and timestamp of an existing record are never rewritten, so a
/// replayed or redelivered message is a no-op.
pub async fn upsert_message(db: &Database, msg: &Message) -> Result<UpsertOutcome, WadeskError> {
    let msg = msg.clone();
    let media = if msg.media.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&msg.media).map_err(|e| WadeskError::Storage {
            source: Box::new(e),
        })?)
    };

    db.connection()
        .call(move |conn| -> Result<UpsertOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT delivery_status FROM messages WHERE id = ?1",
                    params![msg.id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        &format!("INSERT INTO messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                        params![
                            msg.id,
                            msg.conversation_id,
                            msg.body,
                            msg.author,
                            format_ts(&msg.created_at),
                            msg.delivery_status.to_string(),
                            media,
                        ],
                    )?;
                    UpsertOutcome::Inserted
                }
                Some(current) if parse_status(0, &current)?.advances_to(msg.delivery_status) => {
                    tx.execute(
                        "UPDATE messages SET delivery_status = ?2, \
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
                        params![msg.id, msg.delivery_status.to_string()],
                    )?;
                    UpsertOutcome::StatusUpdated
                }
                Some(_) => UpsertOutcome::Unchanged,
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Advance the delivery status of a known message. Returns whether a row changed.
pub async fn update_delivery_status(
    db: &Database,
    id: &str,
    status: DeliveryStatus,
) -> Result<bool, WadeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT delivery_status FROM messages WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let changed = match current {
                Some(current) if parse_status(0, &current)?.advances_to(status) => {
                    tx.execute(
                        "UPDATE messages SET delivery_status = ?2, \
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
                        params![id, status.to_string()],
                    )? > 0
                }
                _ => false,
            };
            tx.commit()?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation ordered by `(created_at, id)`.
///
/// With a limit, the most recent `limit` messages are returned, still ascending.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, WadeskError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let sql = match limit {
                Some(_) => format!(
                    "SELECT {COLUMNS} FROM (
                         SELECT {COLUMNS} FROM messages WHERE conversation_id = ?1
                         ORDER BY created_at DESC, id DESC LIMIT ?2
                     ) ORDER BY created_at ASC, id ASC"
                ),
                None => format!(
                    "SELECT {COLUMNS} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at ASC, id ASC"
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match limit {
                Some(lim) => stmt.query_map(params![conversation_id, lim], row_to_message)?,
                None => stmt.query_map(params![conversation_id], row_to_message)?,
            };
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, conversation: &str, second: u32) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation.to_string(),
            body: format!("body of {id}"),
            author: "whatsapp:+15550001111".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, second).unwrap(),
            delivery_status: DeliveryStatus::Sent,
            media: vec![],
        }
    }

    #[tokio::test]
    async fn insert_and_list_in_order() {
        let (db, _dir) = setup_db().await;

        // Inserted out of order on purpose.
        for (id, sec) in [("IM3", 3), ("IM1", 1), ("IM2", 2)] {
            let outcome = upsert_message(&db, &make_msg(id, "CH1", sec)).await.unwrap();
            assert_eq!(outcome, UpsertOutcome::Inserted);
        }
        upsert_message(&db, &make_msg("IMx", "CH2", 0)).await.unwrap();

        let messages = list_messages(&db, "CH1", None).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["IM1", "IM2", "IM3"]);
        assert_eq!(messages[0].body, "body of IM1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_timestamp_orders_by_id() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("IMb", "CH1", 5)).await.unwrap();
        upsert_message(&db, &make_msg("IMa", "CH1", 5)).await.unwrap();

        let messages = list_messages(&db, "CH1", None).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["IMa", "IMb"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_ascending() {
        let (db, _dir) = setup_db().await;
        for i in 0..5 {
            upsert_message(&db, &make_msg(&format!("IM{i}"), "CH1", i)).await.unwrap();
        }

        let messages = list_messages(&db, "CH1", Some(3)).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["IM2", "IM3", "IM4"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_upsert_is_unchanged() {
        let (db, _dir) = setup_db().await;
        let msg = make_msg("IM1", "CH1", 1);
        assert!(upsert_message(&db, &msg).await.unwrap().is_new());

        let mut replay = msg.clone();
        replay.body = "edited".to_string();
        assert_eq!(
            upsert_message(&db, &replay).await.unwrap(),
            UpsertOutcome::Unchanged
        );

        let stored = get_message(&db, "IM1").await.unwrap().unwrap();
        assert_eq!(stored.body, "body of IM1");
        assert_eq!(list_messages(&db, "CH1", None).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delivery_status_only_advances() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("IM1", "CH1", 1)).await.unwrap();

        assert!(update_delivery_status(&db, "IM1", DeliveryStatus::Read).await.unwrap());
        assert!(!update_delivery_status(&db, "IM1", DeliveryStatus::Delivered).await.unwrap());
        assert!(!update_delivery_status(&db, "missing", DeliveryStatus::Read).await.unwrap());

        let mut stale = make_msg("IM1", "CH1", 1);
        stale.delivery_status = DeliveryStatus::Delivered;
        assert_eq!(
            upsert_message(&db, &stale).await.unwrap(),
            UpsertOutcome::Unchanged
        );

        let stored = get_message(&db, "IM1").await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Read);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_advances_status() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("IM1", "CH1", 1)).await.unwrap();
        let mut delivered = make_msg("IM1", "CH1", 1);
        delivered.delivery_status = DeliveryStatus::Delivered;
        assert_eq!(
            upsert_message(&db, &delivered).await.unwrap(),
            UpsertOutcome::StatusUpdated
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn media_round_trips() {
        let (db, _dir) = setup_db().await;
        let mut msg = make_msg("IM1", "CH1", 1);
        msg.media.push(MediaItem {
            sid: "ME1".to_string(),
            content_type: "image/png".to_string(),
            filename: None,
            size: Some(2048),
        });
        upsert_message(&db, &msg).await.unwrap();

        let stored = get_message(&db, "IM1").await.unwrap().unwrap();
        assert_eq!(stored, msg);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_message_is_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_message(&db, "nope").await.unwrap().is_none());
        assert!(list_messages(&db, "CH1", None).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
