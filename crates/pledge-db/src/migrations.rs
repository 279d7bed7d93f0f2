use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, refresh_tokens, promises)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user'
                            CHECK (role IN ('user', 'moderator', 'admin')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            -- No foreign key to users: deleting a user leaves its tokens behind.
            CREATE TABLE refresh_tokens (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                token       TEXT NOT NULL UNIQUE,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);

            CREATE TABLE promises (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                parent_id   TEXT REFERENCES promises(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                deadline    TEXT NOT NULL,
                status      TEXT NOT NULL
                            CHECK (status IN ('pending', 'in_progress', 'completed')),
                is_private  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_promises_user ON promises(user_id, created_at);
            CREATE INDEX idx_promises_parent ON promises(parent_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
