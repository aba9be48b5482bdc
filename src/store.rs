//! SQLite-backed persistence for conversation turns and sample records.
//!
//! Every write is a single SQL statement, so each insert/update/delete is
//! atomic with respect to other sessions sharing the same database file.
//! Validation happens before the statement runs: empty questions or answers
//! are rejected with [`StoreError::Storage`], and updates that match no row
//! report [`StoreError::NotFound`] without changing anything.

use anyhow::Result as AnyResult;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::StoreError;
use crate::migrate;
use crate::models::{ConversationTurn, Feedback, FeedbackCounts, SampleRecord};

type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the shared store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connects to the configured database and ensures the schema exists.
    pub async fn open(config: &Config) -> AnyResult<Self> {
        let pool = db::connect(config).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Idempotently creates the underlying tables.
    pub async fn init(&self) -> Result<()> {
        migrate::apply_schema(&self.pool).await?;
        Ok(())
    }

    // ── Turns ──

    pub async fn insert_turn(&self, question: &str, answer: &str) -> Result<i64> {
        require_text("question", question)?;
        require_text("answer", answer)?;

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO turns (question, answer, feedback, created_at) VALUES (?, ?, 'none', ?)",
        )
        .bind(question)
        .bind(answer)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrites the feedback of turn `id`. Last write wins.
    pub async fn set_feedback(&self, id: i64, value: Feedback) -> Result<()> {
        let result = sqlx::query("UPDATE turns SET feedback = ? WHERE id = ?")
            .bind(value.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "turn", id });
        }
        Ok(())
    }

    pub async fn get_turn(&self, id: i64) -> Result<ConversationTurn> {
        let row = sqlx::query(
            "SELECT id, question, answer, feedback, created_at FROM turns WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => turn_from_row(&row),
            None => Err(StoreError::NotFound { kind: "turn", id }),
        }
    }

    /// All turns, newest first.
    pub async fn list_turns(&self) -> Result<Vec<ConversationTurn>> {
        self.recent_turns(None).await
    }

    /// Newest turns first, optionally capped at `limit`.
    pub async fn recent_turns(&self, limit: Option<i64>) -> Result<Vec<ConversationTurn>> {
        // SQLite treats a negative LIMIT as "no limit".
        let rows = sqlx::query(
            "SELECT id, question, answer, feedback, created_at FROM turns \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(turn_from_row).collect()
    }

    pub async fn count_turns(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM turns")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn feedback_counts(&self) -> Result<FeedbackCounts> {
        let rows = sqlx::query("SELECT feedback, COUNT(*) AS n FROM turns GROUP BY feedback")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = FeedbackCounts::default();
        for row in &rows {
            let n: i64 = row.get("n");
            match parse_feedback(row.get("feedback"))? {
                Feedback::Positive => counts.positive = n,
                Feedback::Negative => counts.negative = n,
                Feedback::None => counts.none = n,
            }
        }
        Ok(counts)
    }

    // ── Samples ──

    pub async fn list_samples(&self) -> Result<Vec<SampleRecord>> {
        let rows = sqlx::query("SELECT id, question, answer FROM samples ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(sample_from_row).collect())
    }

    pub async fn count_samples(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM samples")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn insert_sample(&self, question: &str, answer: &str) -> Result<i64> {
        require_text("question", question)?;
        require_text("answer", answer)?;

        let result = sqlx::query("INSERT INTO samples (question, answer) VALUES (?, ?)")
            .bind(question)
            .bind(answer)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update_sample(&self, id: i64, question: &str, answer: &str) -> Result<()> {
        require_text("question", question)?;
        require_text("answer", answer)?;

        let result = sqlx::query("UPDATE samples SET question = ?, answer = ? WHERE id = ?")
            .bind(question)
            .bind(answer)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "sample", id });
        }
        Ok(())
    }

    pub async fn delete_sample(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM samples WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "sample", id });
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Storage(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// A stored value that does not decode is a database fault, not a bad write.
fn parse_feedback(raw: String) -> Result<Feedback> {
    raw.parse::<Feedback>()
        .map_err(|msg| StoreError::Database(sqlx::Error::Decode(msg.into())))
}

fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn> {
    Ok(ConversationTurn {
        id: row.get("id"),
        question: row.get("question"),
        answer: row.get("answer"),
        feedback: parse_feedback(row.get("feedback"))?,
        created_at: row.get("created_at"),
    })
}

fn sample_from_row(row: &SqliteRow) -> SampleRecord {
    SampleRecord {
        id: row.get("id"),
        question: row.get("question"),
        answer: row.get("answer"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_db_path(tmp.path().join("data").join("test.sqlite"));
        let store = Store::open(&config).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (_tmp, store) = test_store().await;
        store.init().await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.count_turns().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_turn_then_list() {
        let (_tmp, store) = test_store().await;
        let before = store.list_turns().await.unwrap().len();

        let id = store.insert_turn("What is Rust?", "A systems language.").await.unwrap();

        let turns = store.list_turns().await.unwrap();
        assert_eq!(turns.len(), before + 1);
        let matching: Vec<_> = turns
            .iter()
            .filter(|t| t.question == "What is Rust?" && t.answer == "A systems language.")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id, id);
        assert_eq!(matching[0].feedback, Feedback::None);
    }

    #[tokio::test]
    async fn test_insert_turn_rejects_empty_fields() {
        let (_tmp, store) = test_store().await;

        let err = store.insert_turn("", "answer").await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        let err = store.insert_turn("question", "   ").await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        assert_eq!(store.count_turns().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_turn_ids_are_monotonic_and_listed_newest_first() {
        let (_tmp, store) = test_store().await;
        let a = store.insert_turn("q1", "a1").await.unwrap();
        let b = store.insert_turn("q2", "a2").await.unwrap();
        let c = store.insert_turn("q3", "a3").await.unwrap();
        assert!(a < b && b < c);

        let ids: Vec<i64> = store.list_turns().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c, b, a]);

        let recent = store.recent_turns(Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, c);
    }

    #[tokio::test]
    async fn test_set_feedback_last_write_wins() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_turn("q", "a").await.unwrap();

        store.set_feedback(id, Feedback::Positive).await.unwrap();
        store.set_feedback(id, Feedback::Negative).await.unwrap();

        let turn = store.get_turn(id).await.unwrap();
        assert_eq!(turn.feedback, Feedback::Negative);
    }

    #[tokio::test]
    async fn test_set_feedback_missing_id_changes_nothing() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_turn("q", "a").await.unwrap();
        let before = store.list_turns().await.unwrap();

        let err = store.set_feedback(id + 100, Feedback::Positive).await.unwrap_err();
        assert!(err.is_not_found());

        let after = store.list_turns().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_feedback_counts() {
        let (_tmp, store) = test_store().await;
        let a = store.insert_turn("q1", "a1").await.unwrap();
        let b = store.insert_turn("q2", "a2").await.unwrap();
        store.insert_turn("q3", "a3").await.unwrap();
        store.set_feedback(a, Feedback::Positive).await.unwrap();
        store.set_feedback(b, Feedback::Negative).await.unwrap();

        let counts = store.feedback_counts().await.unwrap();
        assert_eq!(
            counts,
            FeedbackCounts {
                positive: 1,
                negative: 1,
                none: 1
            }
        );
    }

    #[tokio::test]
    async fn test_sample_round_trip() {
        let (_tmp, store) = test_store().await;
        let id = store
            .insert_sample("日本の首都は？", "日本の首都は東京です。")
            .await
            .unwrap();

        let samples = store.list_samples().await.unwrap();
        assert_eq!(
            samples,
            vec![SampleRecord {
                id,
                question: "日本の首都は？".to_string(),
                answer: "日本の首都は東京です。".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_sample() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_sample("q", "a").await.unwrap();

        store.update_sample(id, "q2", "a2").await.unwrap();
        let samples = store.list_samples().await.unwrap();
        assert_eq!(samples[0].question, "q2");
        assert_eq!(samples[0].answer, "a2");

        store.delete_sample(id).await.unwrap();
        assert_eq!(store.count_samples().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sample_missing_id_is_not_found() {
        let (_tmp, store) = test_store().await;
        store.insert_sample("q", "a").await.unwrap();

        assert!(store.update_sample(999, "x", "y").await.unwrap_err().is_not_found());
        assert!(store.delete_sample(999).await.unwrap_err().is_not_found());
        assert_eq!(store.count_samples().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_sample_rejects_empty_fields() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_sample("q", "a").await.unwrap();

        let err = store.update_sample(id, "q", "").await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert_eq!(store.list_samples().await.unwrap()[0].answer, "a");
    }

    #[test]
    fn test_undecodable_feedback_is_a_database_error() {
        let err = parse_feedback("bogus".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::Database(sqlx::Error::Decode(_))));
        assert_eq!(parse_feedback("negative".to_string()).unwrap(), Feedback::Negative);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_all_kept() {
        let (_tmp, store) = test_store().await;

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_turn(&format!("question {}", i), &format!("answer {}", i))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 50);
        assert_eq!(store.count_turns().await.unwrap(), 50);
    }
}
