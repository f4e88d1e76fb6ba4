use std::collections::HashSet;

use deadpool_postgres::Pool;

use super::error::DbError;

/// Schema migrations, applied in order and tracked by name in `_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_campaigns.sql",
        include_str!("../../migrations/001_campaigns.sql"),
    ),
    (
        "002_interactions.sql",
        include_str!("../../migrations/002_interactions.sql"),
    ),
];

pub async fn run(pool: &Pool) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();
    drop(client);

    for name in pending(&applied) {
        let Some((_, sql)) = MIGRATIONS.iter().find(|(n, _)| *n == name) else {
            continue;
        };

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;

        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[&name])
            .await?;

        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("All migrations up to date");
    Ok(())
}

fn pending(applied: &HashSet<String>) -> Vec<&'static str> {
    MIGRATIONS
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !applied.contains(*name))
        .collect()
}
