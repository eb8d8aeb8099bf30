//! Uniform create/open/insert/scan/attach-merge adapter over an opaque
//! `pairs(key, value)` table file.
//!
//! Durability is intentionally relaxed (no journaling, no synchronous
//! writes): shard files are short-lived scratch data bounded by a single
//! job's runtime, never a durable store. Mirrors
//! `examples/original_source/db.go`'s `openDatabase`/`createDatabase`.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::error::MrError;
use crate::pair::Pair;

/// A handle to one shard file's `pairs` table.
pub struct ShardStore {
    conn: Connection,
}

const PRAGMAS: &str = "
    PRAGMA busy_timeout = 10000;
    PRAGMA case_sensitive_like = OFF;
    PRAGMA foreign_keys = ON;
    PRAGMA journal_mode = OFF;
    PRAGMA locking_mode = NORMAL;
    PRAGMA synchronous = OFF;
";

impl ShardStore {
    /// Opens an existing shard file with the durability pragmas from §6.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ShardStore, MrError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(PRAGMAS)?;
        Ok(ShardStore { conn })
    }

    /// Creates (idempotently) a new shard file: deletes any existing file
    /// at `path`, then creates `pairs(key, value)`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<ShardStore, MrError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(PRAGMAS)?;
        conn.execute("CREATE TABLE pairs (key TEXT, value TEXT)", ())?;
        Ok(ShardStore { conn })
    }

    /// Inserts one row. No uniqueness constraint.
    pub fn insert(&self, key: &str, value: &str) -> Result<(), MrError> {
        self.conn
            .execute("INSERT INTO pairs (key, value) VALUES (?1, ?2)", (key, value))?;
        Ok(())
    }

    /// Scans all rows, in unspecified order.
    pub fn scan(&self) -> Result<Vec<Pair>, MrError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM pairs")?;
        let rows = stmt.query_map((), |row| {
            Ok(Pair::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Scans all rows ordered by key ascending (byte-lexicographic, the
    /// default for SQLite's `TEXT` comparisons under `BINARY` collation).
    pub fn scan_ordered_by_key(&self) -> Result<Vec<Pair>, MrError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM pairs ORDER BY key")?;
        let rows = stmt.query_map((), |row| {
            Ok(Pair::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Appends every row of the shard file at `other_path` into this shard,
    /// then deletes `other_path`.
    pub fn attach_and_append<P: AsRef<Path>>(&self, other_path: P) -> Result<(), MrError> {
        let other_path = other_path.as_ref();
        let other_str = other_path
            .to_str()
            .ok_or_else(|| MrError::ShardIo(format!("non-utf8 path: {}", other_path.display())))?;
        self.conn.execute("ATTACH DATABASE ?1 AS merge_src", (other_str,))?;
        let result = self
            .conn
            .execute("INSERT INTO pairs SELECT * FROM merge_src.pairs", ());
        // Always try to detach, even if the insert failed, so the connection
        // doesn't leak the attachment.
        let _ = self.conn.execute("DETACH DATABASE merge_src", ());
        result?;
        std::fs::remove_file(other_path)?;
        Ok(())
    }

    /// Number of rows currently in the table. Used only by the split step
    /// to check the `InsufficientData` boundary.
    pub fn count(&self) -> Result<usize, MrError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pairs", (), |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_open_insert_scan_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.db");

        {
            let store = ShardStore::create(&path).unwrap();
            store.insert("a", "1").unwrap();
            store.insert("b", "2").unwrap();
        }

        let store = ShardStore::open(&path).unwrap();
        let mut rows = store.scan().unwrap();
        rows.sort();
        assert_eq!(rows, vec![Pair::new("a", "1"), Pair::new("b", "2")]);
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.db");

        let store = ShardStore::create(&path).unwrap();
        store.insert("a", "1").unwrap();
        drop(store);

        let store = ShardStore::create(&path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn attach_and_append_merges_and_deletes_source() {
        let dir = tempdir().unwrap();
        let dst_path = dir.path().join("dst.db");
        let src_path = dir.path().join("src.db");

        let dst = ShardStore::create(&dst_path).unwrap();
        dst.insert("a", "1").unwrap();

        let src = ShardStore::create(&src_path).unwrap();
        src.insert("b", "2").unwrap();
        drop(src);

        dst.attach_and_append(&src_path).unwrap();

        let mut rows = dst.scan().unwrap();
        rows.sort();
        assert_eq!(rows, vec![Pair::new("a", "1"), Pair::new("b", "2")]);
        assert!(!src_path.exists());
    }

    #[test]
    fn scan_ordered_by_key_is_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.db");
        let store = ShardStore::create(&path).unwrap();
        for (k, v) in [("c", "3"), ("a", "1"), ("b", "2")] {
            store.insert(k, v).unwrap();
        }
        let rows = store.scan_ordered_by_key().unwrap();
        let keys: Vec<&str> = rows.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
