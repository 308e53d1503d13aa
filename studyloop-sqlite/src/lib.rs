use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use studyloop_core::store::{ProgressStore, SessionStore};
use studyloop_core::{
    CardId, CardOutcome, CoreError, ListId, ProgressAggregate, Session, SessionId, StudyMode,
    UserId,
};

/// One pool serving both the session and the progress store.
pub struct SqliteStores {
    pool: SqlitePool,
}

impl SqliteStores {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let stores = Self { pool };
        stores.ensure_schema().await?;
        Ok(stores)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        // One connection: each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let stores = Self { pool };
        stores.ensure_schema().await?;
        Ok(stores)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS study_sessions (
          id            TEXT PRIMARY KEY,
          user_id       TEXT NOT NULL,
          list_id       TEXT NOT NULL,
          mode          TEXT NOT NULL,
          cards_order   TEXT NOT NULL,
          current_index INTEGER NOT NULL DEFAULT 0,
          completed     INTEGER NOT NULL DEFAULT 0,
          created_at    TEXT NOT NULL,
          updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS card_progress (
          user_id         TEXT NOT NULL,
          flashcard_id    TEXT NOT NULL,
          list_id         TEXT NOT NULL,
          correct_count   INTEGER NOT NULL DEFAULT 0,
          incorrect_count INTEGER NOT NULL DEFAULT 0,
          last_reviewed   TEXT NOT NULL,
          PRIMARY KEY (user_id, flashcard_id)
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_scope
          ON study_sessions (user_id, list_id, mode, completed, updated_at);
        CREATE INDEX IF NOT EXISTS idx_progress_list
          ON card_progress (user_id, list_id);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }
}

const SESSION_COLS: &str =
    "id,user_id,list_id,mode,cards_order,current_index,completed,created_at,updated_at";

#[async_trait::async_trait]
impl SessionStore for SqliteStores {
    async fn create(&self, session: &Session) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO study_sessions (
              id, user_id, list_id, mode, cards_order, current_index, completed,
              created_at, updated_at
            )
            VALUES (?,?,?,?,?,?,?,?,?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(session.list_id.to_string())
        .bind(mode_to_str(session.mode))
        .bind(ids_to_json(&session.cards_order))
        .bind(session.current_index as i64)
        .bind(bool_to_i(session.completed))
        .bind(dt_to_str(session.created_at))
        .bind(dt_to_str(session.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("insert session"))?;
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Session, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLS} FROM study_sessions WHERE id=?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read session"))?;
        let row = row.ok_or(CoreError::NotFound("session"))?;
        row_into_session(row)
    }

    async fn latest_incomplete(
        &self,
        user: UserId,
        list: ListId,
        mode: StudyMode,
    ) -> Result<Option<Session>, CoreError> {
        let row = sqlx::query(&format!(
            r#"SELECT {SESSION_COLS} FROM study_sessions
               WHERE user_id=? AND list_id=? AND mode=? AND completed=0
               ORDER BY updated_at DESC
               LIMIT 1"#
        ))
        .bind(user.to_string())
        .bind(list.to_string())
        .bind(mode_to_str(mode))
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read session"))?;
        row.map(row_into_session).transpose()
    }

    async fn update_progress(
        &self,
        id: SessionId,
        cards_order: &[CardId],
        current_index: usize,
    ) -> Result<(), CoreError> {
        let res = sqlx::query(
            "UPDATE study_sessions SET cards_order=?, current_index=?, updated_at=? WHERE id=?",
        )
        .bind(ids_to_json(cards_order))
        .bind(current_index as i64)
        .bind(dt_to_str(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("save cursor"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("session"));
        }
        Ok(())
    }

    async fn mark_completed(&self, id: SessionId) -> Result<(), CoreError> {
        let res = sqlx::query("UPDATE study_sessions SET completed=1, updated_at=? WHERE id=?")
            .bind(dt_to_str(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("complete session"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("session"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProgressStore for SqliteStores {
    async fn aggregates(
        &self,
        user: UserId,
        list: ListId,
        ids: &[CardId],
    ) -> Result<Vec<ProgressAggregate>, CoreError> {
        let rows = sqlx::query(
            r#"SELECT user_id,flashcard_id,list_id,correct_count,incorrect_count,last_reviewed
               FROM card_progress WHERE user_id=? AND list_id=?"#,
        )
        .bind(user.to_string())
        .bind(list.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read progress"))?;

        let wanted: HashSet<CardId> = ids.iter().copied().collect();
        let mut v = Vec::with_capacity(rows.len());
        for row in rows {
            let agg = row_into_aggregate(row)?;
            if wanted.contains(&agg.flashcard_id) {
                v.push(agg);
            }
        }
        Ok(v)
    }

    async fn record_outcomes(
        &self,
        user: UserId,
        list: ListId,
        outcomes: &[CardOutcome],
    ) -> Result<(), CoreError> {
        if outcomes.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;
        for o in outcomes {
            let (correct, incorrect) = if o.correct { (1i64, 0i64) } else { (0i64, 1i64) };
            sqlx::query(
                r#"
                INSERT INTO card_progress (
                  user_id, flashcard_id, list_id, correct_count, incorrect_count, last_reviewed
                )
                VALUES (?,?,?,?,?,?)
                ON CONFLICT(user_id, flashcard_id) DO UPDATE SET
                  correct_count   = correct_count + excluded.correct_count,
                  incorrect_count = incorrect_count + excluded.incorrect_count,
                  list_id         = excluded.list_id,
                  last_reviewed   = excluded.last_reviewed
                "#,
            )
            .bind(user.to_string())
            .bind(o.flashcard_id.to_string())
            .bind(list.to_string())
            .bind(correct)
            .bind(incorrect)
            .bind(dt_to_str(o.at))
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("record outcome"))?;
        }
        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))
    }
}

// ===== Helpers =====
fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

// Fixed-width so lexicographic ORDER BY on the TEXT column matches
// chronological order.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn mode_to_str(mode: StudyMode) -> &'static str {
    match mode {
        StudyMode::Flip => "flip",
        StudyMode::Write => "write",
        StudyMode::Choice => "choice",
        StudyMode::Unscramble => "unscramble",
    }
}

fn mode_from_str(s: &str) -> Option<StudyMode> {
    match s {
        "flip" => Some(StudyMode::Flip),
        "write" => Some(StudyMode::Write),
        "choice" => Some(StudyMode::Choice),
        "unscramble" => Some(StudyMode::Unscramble),
        _ => None,
    }
}

fn bool_to_i(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

fn ids_to_json(ids: &[CardId]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

fn ids_from_json(s: &str) -> Result<Vec<CardId>, CoreError> {
    serde_json::from_str(s).map_err(|_| CoreError::Invalid("cards order"))
}

fn row_into_session(row: sqlx::sqlite::SqliteRow) -> Result<Session, CoreError> {
    let order_json: String = row.get("cards_order");
    Ok(Session {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        user_id: uuid_from_str(row.get::<String, _>("user_id"))?,
        list_id: uuid_from_str(row.get::<String, _>("list_id"))?,
        mode: mode_from_str(&row.get::<String, _>("mode")).ok_or(CoreError::Invalid("mode"))?,
        cards_order: ids_from_json(&order_json)?,
        current_index: row.get::<i64, _>("current_index") as usize,
        completed: row.get::<i64, _>("completed") != 0,
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
        updated_at: dt_from_str(row.get::<String, _>("updated_at"))?,
    })
}

fn row_into_aggregate(row: sqlx::sqlite::SqliteRow) -> Result<ProgressAggregate, CoreError> {
    Ok(ProgressAggregate {
        user_id: uuid_from_str(row.get::<String, _>("user_id"))?,
        flashcard_id: uuid_from_str(row.get::<String, _>("flashcard_id"))?,
        list_id: uuid_from_str(row.get::<String, _>("list_id"))?,
        correct_count: row.get::<i64, _>("correct_count") as u32,
        incorrect_count: row.get::<i64, _>("incorrect_count") as u32,
        last_reviewed: dt_from_str(row.get::<String, _>("last_reviewed"))?,
    })
}
