use duckdb::Connection;

/// DDL for the analytics tables. The same text is embedded in the SQL
/// generation prompt so the model sees exactly what it can query.
pub const SCHEMA_DDL: &str = r#"CREATE TABLE videos (
    id UUID PRIMARY KEY,
    creator_id VARCHAR NOT NULL,
    video_created_at TIMESTAMP,
    views_count BIGINT DEFAULT 0,
    likes_count BIGINT DEFAULT 0,
    comments_count BIGINT DEFAULT 0,
    reports_count BIGINT DEFAULT 0,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE video_snapshots (
    id UUID PRIMARY KEY,
    video_id UUID REFERENCES videos(id),
    views_count BIGINT DEFAULT 0,
    likes_count BIGINT DEFAULT 0,
    comments_count BIGINT DEFAULT 0,
    reports_count BIGINT DEFAULT 0,
    delta_views_count BIGINT DEFAULT 0,
    delta_likes_count BIGINT DEFAULT 0,
    delta_comments_count BIGINT DEFAULT 0,
    delta_reports_count BIGINT DEFAULT 0,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);"#;

/// Creates the analytics tables if they are not present yet.
pub fn bootstrap(conn: &Connection) -> duckdb::Result<()> {
    let ddl = SCHEMA_DDL.replace("CREATE TABLE ", "CREATE TABLE IF NOT EXISTS ");
    conn.execute_batch(&ddl)
}

/// Drops and recreates both tables. Used by the bulk loader before a full
/// reload.
pub fn reset(conn: &Connection) -> duckdb::Result<()> {
    conn.execute_batch("DROP TABLE IF EXISTS video_snapshots; DROP TABLE IF EXISTS videos;")?;
    conn.execute_batch(SCHEMA_DDL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        bootstrap(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn reset_clears_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute(
            "INSERT INTO videos (id, creator_id) VALUES (CAST('11111111-1111-1111-1111-111111111111' AS UUID), '7')",
            [],
        )
        .unwrap();

        reset(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
