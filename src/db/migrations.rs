use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS prayer_times (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            date              TEXT NOT NULL,
            kind              TEXT NOT NULL
                              CHECK(kind IN ('fajr','dhuhr','jumuah','asr','maghrib','isha')),
            adhan             TEXT NOT NULL,
            duration_minutes  INTEGER NOT NULL,
            buffer_before     INTEGER NOT NULL DEFAULT 0,
            buffer_after      INTEGER NOT NULL DEFAULT 0,
            method            TEXT NOT NULL,
            latitude          REAL NOT NULL,
            longitude         REAL NOT NULL,
            hijri             TEXT,
            fetched_at        TEXT DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_prayer_times_lookup
            ON prayer_times (date, method);

        CREATE TABLE IF NOT EXISTS tasks (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            title             TEXT NOT NULL,
            duration_minutes  INTEGER NOT NULL DEFAULT 30,
            category          TEXT NOT NULL,
            scheduled_at      TEXT,
            due_date          TEXT,
            notes             TEXT,
            completed         INTEGER NOT NULL DEFAULT 0,
            completed_at      TEXT,
            recurrence        TEXT,
            parent_id         INTEGER,
            dismissed_dates   TEXT NOT NULL DEFAULT '[]',
            created_at        TEXT DEFAULT (datetime('now')),
            CHECK (parent_id IS NULL OR recurrence IS NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_scheduled ON tasks (scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks (parent_id);

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;
    Ok(())
}
