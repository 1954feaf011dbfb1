//! Artifact Store - rusqlite 기반 인덱스 아티팩트 저장소
//!
//! 제도 레코드와 임베딩을 **한 파일, 한 트랜잭션**으로 저장합니다.
//! 인덱스와 코퍼스가 따로 저장되어 ordinal이 어긋나는 일이 없도록 합니다.
//! 저장 위치: ~/.scheme-rag/schemes.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use crate::corpus::SchemeRecord;

use super::indexed::{IndexMeta, IndexedCorpus};

/// 아티팩트 스키마 버전
const SCHEMA_VERSION: &str = "1";

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub scheme_count: usize,
    pub total_text_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// ArtifactStore
// ============================================================================

/// SQLite 아티팩트 저장소
pub struct ArtifactStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ArtifactStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create artifact directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schemes (
                ordinal INTEGER PRIMARY KEY,
                scheme_name TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL,
                details TEXT NOT NULL,
                eligibility TEXT NOT NULL,
                benefits TEXT NOT NULL,
                application TEXT NOT NULL,
                documents TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_schemes_name ON schemes(scheme_name);
            "#,
        )
        .context("Failed to create artifact tables")?;

        tracing::debug!("Artifact store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 코퍼스 전체 저장 (기존 내용 교체)
    pub fn save(&self, corpus: &IndexedCorpus) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute("DELETE FROM schemes", [])?;
        tx.execute("DELETE FROM meta", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO schemes (ordinal, scheme_name, category, tags, details,
                    eligibility, benefits, application, documents, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for (ordinal, (record, vector)) in corpus.pairs().enumerate() {
                stmt.execute(params![
                    ordinal as i64,
                    record.scheme_name,
                    record.category,
                    record.tags,
                    record.details,
                    record.eligibility,
                    record.benefits,
                    record.application,
                    record.documents,
                    encode_vector(vector),
                ])
                .with_context(|| format!("Failed to insert scheme '{}'", record.scheme_name))?;
            }

            let meta = corpus.meta();
            let mut meta_stmt = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            for (key, value) in [
                ("schema_version", SCHEMA_VERSION.to_string()),
                ("embedder", meta.embedder.clone()),
                ("dimension", meta.dimension.to_string()),
                ("scheme_count", meta.scheme_count.to_string()),
                ("built_at", meta.built_at.to_rfc3339()),
                ("fingerprint", meta.fingerprint.clone()),
            ] {
                meta_stmt.execute(params![key, value])?;
            }
        }

        tx.commit().context("Failed to commit artifact")?;

        tracing::info!(
            "Saved {} schemes to {:?}",
            corpus.len(),
            self.db_path
        );
        Ok(())
    }

    /// 메타데이터만 조회 (아티팩트가 없으면 None)
    pub fn load_meta(&self) -> Result<Option<IndexMeta>> {
        let conn = self.lock()?;
        read_meta(&conn)
    }

    /// 코퍼스 전체 로드 (아티팩트가 없으면 None)
    pub fn load(&self) -> Result<Option<IndexedCorpus>> {
        let conn = self.lock()?;

        let meta = match read_meta(&conn)? {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            "SELECT scheme_name, category, tags, details, eligibility, benefits,
                    application, documents, embedding
             FROM schemes ORDER BY ordinal ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let record = SchemeRecord {
                scheme_name: row.get(0)?,
                category: row.get(1)?,
                tags: row.get(2)?,
                details: row.get(3)?,
                eligibility: row.get(4)?,
                benefits: row.get(5)?,
                application: row.get(6)?,
                documents: row.get(7)?,
            };
            let blob: Vec<u8> = row.get(8)?;
            Ok((record, blob))
        })?;

        let mut pairs = Vec::with_capacity(meta.scheme_count);
        for row in rows {
            let (record, blob) = row.context("Failed to read scheme row")?;
            let vector = decode_vector(&blob)
                .with_context(|| format!("Corrupt embedding for '{}'", record.scheme_name))?;
            pairs.push((record, vector));
        }

        if pairs.len() != meta.scheme_count {
            anyhow::bail!(
                "Artifact is inconsistent: meta says {} schemes, found {}",
                meta.scheme_count,
                pairs.len()
            );
        }

        let corpus =
            IndexedCorpus::from_pairs_at(&meta.embedder, meta.dimension, pairs, meta.built_at)?;

        if corpus.meta().fingerprint != meta.fingerprint {
            anyhow::bail!("Artifact fingerprint mismatch; rebuild the index");
        }

        tracing::info!(
            "Loaded {} schemes (embedder={}, dim={})",
            corpus.len(),
            meta.embedder,
            meta.dimension
        );
        Ok(Some(corpus))
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schemes", [], |row| row.get(0))
            .unwrap_or(0);

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(details) + LENGTH(eligibility) + LENGTH(benefits)), 0)
                 FROM schemes",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            scheme_count: count as usize,
            total_text_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn read_meta(conn: &Connection) -> Result<Option<IndexMeta>> {
    let get = |key: &str| -> Result<Option<String>> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("Failed to read meta '{}'", key))
    };

    let embedder = match get("embedder")? {
        Some(v) => v,
        None => return Ok(None),
    };

    let version = get("schema_version")?.unwrap_or_default();
    if version != SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported artifact schema version '{}' (expected {})",
            version,
            SCHEMA_VERSION
        );
    }

    let dimension: usize = get("dimension")?
        .unwrap_or_default()
        .parse()
        .context("Invalid dimension in artifact meta")?;
    let scheme_count: usize = get("scheme_count")?
        .unwrap_or_default()
        .parse()
        .context("Invalid scheme_count in artifact meta")?;
    let built_at = parse_datetime(&get("built_at")?.unwrap_or_default())?;
    let fingerprint = get("fingerprint")?.unwrap_or_default();

    Ok(Some(IndexMeta {
        embedder,
        dimension,
        scheme_count,
        built_at,
        fingerprint,
    }))
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid built_at timestamp: '{}'", s))
}

/// f32 벡터 → little-endian 바이트
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// little-endian 바이트 → f32 벡터
fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        anyhow::bail!("Embedding blob length {} is not a multiple of 4", blob.len());
    }
    let vector: Vec<f32> = blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if vector.iter().any(|x| !x.is_finite()) {
        anyhow::bail!("Embedding blob contains non-finite values");
    }
    Ok(vector)
}

// ============================================================================
// Tests
// ============================================================================
