//! SQLite-backed vector index.
//!
//! One database file per namespace. The connection sits behind a mutex and
//! every operation runs on the blocking thread pool, so async workers never
//! wait on disk I/O.

use crate::types::FragmentMetadata;
use crate::vector_index::{
    check_query_dimension, cosine_similarity, entry_dimension_error, rank, IndexEntry,
    IndexStats, MetadataFilter, RetrievalResult, UpsertReport, VectorIndex,
};
use edith_core::{AppError, AppResult};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fragments (
    fragment_id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    source_filename TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    char_start INTEGER NOT NULL,
    char_end INTEGER NOT NULL,
    text TEXT NOT NULL,
    extra TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fragments_document ON fragments(document_id);
CREATE INDEX IF NOT EXISTS idx_fragments_source ON fragments(source_filename);
"#;

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Index(format!("{}: {}", context, e))
}

/// Persistent index stored in a single SQLite file.
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    dimension: usize,
    capacity: Option<usize>,
}

impl SqliteIndex {
    /// Open or create the index at `db_path`.
    ///
    /// The first open records the dimension and embedding model; later opens
    /// with a different dimension or model fail with a configuration error.
    pub fn open(
        db_path: &Path,
        dimension: usize,
        model: &str,
        capacity: Option<usize>,
    ) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Index(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn =
            Connection::open(db_path).map_err(db_err("Failed to open SQLite index"))?;
        conn.execute_batch(SCHEMA)
            .map_err(db_err("Failed to create tables"))?;

        check_or_record_meta(&conn, db_path, "dimension", &dimension.to_string())?;
        check_or_record_meta(&conn, db_path, "model", model)?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path.to_path_buf(),
            dimension,
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut guard)
        })
        .await
        .map_err(|e| AppError::Index(format!("Index task failed: {}", e)))?
    }
}

fn check_or_record_meta(conn: &Connection, path: &Path, key: &str, value: &str) -> AppResult<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err("Failed to read index metadata"))?;

    match stored {
        Some(existing) if existing != value => Err(AppError::Config(format!(
            "Index {:?} was built with {} '{}', but the configuration uses '{}'. \
             Clear the index or use another namespace.",
            path, key, existing, value
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(db_err("Failed to write index metadata"))?;
            Ok(())
        }
    }
}

/// WHERE clause and bound values for a filter.
fn filter_clause(filter: Option<&MetadataFilter>) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(filter) = filter {
        if let Some(ref id) = filter.document_id {
            values.push(Value::Text(id.clone()));
            conditions.push(format!("document_id = ?{}", values.len()));
        }
        if let Some(ref name) = filter.source_filename {
            values.push(Value::Text(name.clone()));
            conditions.push(format!("source_filename = ?{}", values.len()));
        }
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn count_rows(conn: &Connection) -> AppResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM fragments", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .map_err(db_err("Failed to count fragments"))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> AppResult<UpsertReport> {
        let dimension = self.dimension;
        let capacity = self.capacity;

        self.with_conn(move |conn| {
            let mut report = UpsertReport::default();
            let tx = conn
                .transaction()
                .map_err(db_err("Failed to begin transaction"))?;
            let mut count = count_rows(&tx)?;

            for entry in entries {
                if let Some(reason) = entry_dimension_error(&entry, dimension) {
                    report.failed.push((entry.fragment_id, reason));
                    continue;
                }

                let exists = tx
                    .query_row(
                        "SELECT 1 FROM fragments WHERE fragment_id = ?1",
                        params![entry.fragment_id],
                        |_| Ok(()),
                    )
                    .optional()
                    .map_err(db_err("Failed to look up fragment"))?
                    .is_some();

                if let Some(capacity) = capacity {
                    if !exists && count >= capacity {
                        report.failed.push((
                            entry.fragment_id,
                            format!("index capacity {} reached", capacity),
                        ));
                        continue;
                    }
                }

                let meta = &entry.metadata;
                let extra = serde_json::to_string(&meta.extra)?;
                tx.execute(
                    "INSERT OR REPLACE INTO fragments \
                     (fragment_id, document_id, source_filename, sequence_index, char_start, \
                      char_end, text, extra, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        entry.fragment_id,
                        meta.document_id,
                        meta.source_filename,
                        meta.sequence_index as i64,
                        meta.char_start as i64,
                        meta.char_end as i64,
                        meta.text,
                        extra,
                        embedding_to_bytes(&entry.vector),
                    ],
                )
                .map_err(db_err("Failed to write fragment"))?;

                if !exists {
                    count += 1;
                }
                report.written += 1;
            }

            tx.commit().map_err(db_err("Failed to commit upsert"))?;
            Ok(report)
        })
        .await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        check_query_dimension(vector, self.dimension)?;

        let query_vector = vector.to_vec();
        let (clause, values) = filter_clause(filter);

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT fragment_id, document_id, source_filename, sequence_index, char_start, \
                 char_end, text, extra, embedding FROM fragments{} ORDER BY fragment_id",
                clause
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(db_err("Failed to prepare query"))?;

            let rows = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Vec<u8>>(8)?,
                    ))
                })
                .map_err(db_err("Failed to query fragments"))?;

            let mut candidates = Vec::new();
            for row in rows {
                let (fragment_id, document_id, source_filename, seq, start, end, text, extra, blob) =
                    row.map_err(db_err("Failed to read fragment"))?;

                let embedding = bytes_to_embedding(&blob)?;
                candidates.push(RetrievalResult {
                    score: cosine_similarity(&query_vector, &embedding),
                    fragment_id,
                    metadata: FragmentMetadata {
                        document_id,
                        source_filename,
                        sequence_index: seq as usize,
                        char_start: start as usize,
                        char_end: end as usize,
                        text,
                        extra: serde_json::from_str(&extra)?,
                    },
                });
            }

            Ok(rank(candidates, top_k))
        })
        .await
    }

    async fn delete(&self, filter: &MetadataFilter) -> AppResult<usize> {
        let (clause, values) = filter_clause(Some(filter));

        self.with_conn(move |conn| {
            let removed = conn
                .execute(
                    &format!("DELETE FROM fragments{}", clause),
                    params_from_iter(values),
                )
                .map_err(db_err("Failed to delete fragments"))?;
            Ok(removed)
        })
        .await
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let dimension = self.dimension;
        let capacity = self.capacity;

        self.with_conn(move |conn| Ok(IndexStats::new(count_rows(conn)?, dimension, capacity)))
            .await
    }
}
