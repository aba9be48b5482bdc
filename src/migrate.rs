//! Schema for the turns and samples tables.

use sqlx::SqlitePool;

/// Creates every table and index if absent. Safe to run on each startup.
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Create turns table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS turns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT NOT NULL CHECK (length(trim(question)) > 0),
            answer TEXT NOT NULL CHECK (length(trim(answer)) > 0),
            feedback TEXT NOT NULL DEFAULT 'none'
                CHECK (feedback IN ('positive', 'negative', 'none')),
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create samples table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT NOT NULL CHECK (length(trim(question)) > 0),
            answer TEXT NOT NULL CHECK (length(trim(answer)) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_created_at ON turns(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_question ON samples(question)")
        .execute(pool)
        .await?;

    Ok(())
}
