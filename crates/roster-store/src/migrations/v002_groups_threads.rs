use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    _id          INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id     TEXT UNIQUE NOT NULL,
    recipient_id INTEGER NOT NULL,              -- FK -> recipient(_id)
    title        TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (recipient_id) REFERENCES recipient(_id)
);

-- One conversation per recipient; `date` is the last activity in epoch millis
CREATE TABLE IF NOT EXISTS threads (
    _id           INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id  INTEGER UNIQUE NOT NULL,      -- FK -> recipient(_id)
    date          INTEGER NOT NULL DEFAULT 0,
    message_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (recipient_id) REFERENCES recipient(_id)
);

CREATE INDEX IF NOT EXISTS idx_threads_date ON threads(date DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
