//! Baseline sample Q&A records inserted on first run.
//!
//! Seeding only happens when the sample collection is empty. Once any sample
//! exists (seeded or user-created) the seed set is never re-applied, so
//! edits made on the sample-data page survive restarts.

use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::Store;

pub struct SeedSample {
    pub question: &'static str,
    pub answer: &'static str,
}

pub const SEED_SAMPLES: &[SeedSample] = &[
    SeedSample {
        question: "日本の首都はどこですか？",
        answer: "日本の首都は東京です。",
    },
    SeedSample {
        question: "富士山の高さは何メートルですか？",
        answer: "富士山の標高は3776メートルです。",
    },
    SeedSample {
        question: "What is machine learning?",
        answer: "Machine learning is a field of AI where systems learn patterns from data instead of following explicit rules.",
    },
    SeedSample {
        question: "What does GPT stand for?",
        answer: "GPT stands for Generative Pre-trained Transformer.",
    },
    SeedSample {
        question: "Pythonでリストを逆順にする方法は？",
        answer: "list.reverse() でその場で反転するか、スライス list[::-1] で反転したコピーを作ります。",
    },
];

/// Inserts [`SEED_SAMPLES`] when no sample exists. Returns how many were inserted.
///
/// The emptiness check and the inserts are a single `INSERT ... SELECT`
/// statement, so the write lock is taken before the check runs and concurrent
/// callers on the same database queue on the busy timeout.
pub async fn ensure_initial_data(store: &Store) -> Result<usize, StoreError> {
    let values = vec!["(?, ?)"; SEED_SAMPLES.len()].join(", ");
    let sql = format!(
        "INSERT INTO samples (question, answer) \
         SELECT column1, column2 FROM (VALUES {}) \
         WHERE NOT EXISTS (SELECT 1 FROM samples)",
        values
    );

    let mut query = sqlx::query(&sql);
    for sample in SEED_SAMPLES {
        query = query.bind(sample.question).bind(sample.answer);
    }
    let inserted = query.execute(store.pool()).await?.rows_affected() as usize;

    if inserted == 0 {
        debug!("sample data already present; skipping seed");
    } else {
        info!(count = inserted, "seeded sample data");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::tests::test_store;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_empty_store() {
        let (_tmp, store) = test_store().await;

        let inserted = ensure_initial_data(&store).await.unwrap();
        assert_eq!(inserted, SEED_SAMPLES.len());

        let samples = store.list_samples().await.unwrap();
        assert_eq!(samples.len(), SEED_SAMPLES.len());
        for (sample, seed) in samples.iter().zip(SEED_SAMPLES) {
            assert_eq!(sample.question, seed.question);
            assert_eq!(sample.answer, seed.answer);
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (_tmp, store) = test_store().await;

        ensure_initial_data(&store).await.unwrap();
        let once = store.count_samples().await.unwrap();
        let second = ensure_initial_data(&store).await.unwrap();
        let twice = store.count_samples().await.unwrap();

        assert_eq!(second, 0);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_seed_skips_non_empty_store() {
        let (_tmp, store) = test_store().await;
        store.insert_sample("custom", "record").await.unwrap();

        assert_eq!(ensure_initial_data(&store).await.unwrap(), 0);
        assert_eq!(store.count_samples().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_seeding_from_two_handles() {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_db_path(tmp.path().join("shared.sqlite"));

        for _ in 0..10 {
            let a = Store::open(&config).await.unwrap();
            let b = Store::open(&config).await.unwrap();
            sqlx::query("DELETE FROM samples").execute(a.pool()).await.unwrap();

            let first = tokio::spawn({
                let a = a.clone();
                async move { ensure_initial_data(&a).await }
            });
            let second = tokio::spawn({
                let b = b.clone();
                async move { ensure_initial_data(&b).await }
            });
            let (first, second) = tokio::join!(first, second);
            let first = first.unwrap().unwrap();
            let second = second.unwrap().unwrap();

            assert_eq!(first + second, SEED_SAMPLES.len());
            assert_eq!(a.count_samples().await.unwrap(), SEED_SAMPLES.len() as i64);

            a.close().await;
            b.close().await;
        }
    }
}
