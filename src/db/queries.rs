pub const CREATE_KV: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
  key        TEXT PRIMARY KEY,
  value      TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

pub const UPSERT_KV: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key)
     DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at";

pub const SELECT_KV: &str = "SELECT value FROM kv WHERE key = ?1";

pub const SELECT_KEYS_WITH_PREFIX: &str =
    "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_KV]
}
