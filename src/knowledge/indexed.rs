//! Indexed Corpus - 레코드와 임베딩의 쌍 구조
//!
//! 인덱스 ordinal `i`는 항상 `records[i]`를 가리킵니다.
//! 필드는 비공개이고 생성 경로는 `from_pairs` 하나뿐이므로
//! 한쪽만 다시 빌드하는 일이 타입 수준에서 불가능합니다.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::corpus::SchemeRecord;

use super::vector::{SearchHit, VectorIndex};

/// 인덱스 메타데이터 (아티팩트에 함께 저장)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexMeta {
    /// 빌드에 사용한 임베딩 프로바이더 이름
    pub embedder: String,
    pub dimension: usize,
    pub scheme_count: usize,
    pub built_at: DateTime<Utc>,
    /// 레코드 내용 SHA-256
    pub fingerprint: String,
}

/// 불변 (레코드, 벡터) 코퍼스
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    meta: IndexMeta,
    records: Vec<SchemeRecord>,
    index: VectorIndex,
    by_name: HashMap<String, usize>,
}

impl IndexedCorpus {
    /// (레코드, 정규화된 벡터) 쌍으로 생성
    pub fn from_pairs(
        embedder: &str,
        dimension: usize,
        pairs: Vec<(SchemeRecord, Vec<f32>)>,
    ) -> Result<Self> {
        let built_at = Utc::now();
        Self::from_pairs_at(embedder, dimension, pairs, built_at)
    }

    /// 빌드 시각을 지정하여 생성 (아티팩트 로드용)
    pub fn from_pairs_at(
        embedder: &str,
        dimension: usize,
        pairs: Vec<(SchemeRecord, Vec<f32>)>,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        let (records, vectors): (Vec<SchemeRecord>, Vec<Vec<f32>>) = pairs.into_iter().unzip();
        let index = VectorIndex::build(dimension, &vectors)?;

        let mut by_name = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            // 중복 이름은 첫 항목 유지
            by_name.entry(record.scheme_name.clone()).or_insert(i);
        }

        let meta = IndexMeta {
            embedder: embedder.to_string(),
            dimension,
            scheme_count: records.len(),
            built_at,
            fingerprint: fingerprint(&records),
        };

        Ok(Self {
            meta,
            records,
            index,
            by_name,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn records(&self) -> &[SchemeRecord] {
        &self.records
    }

    /// 히트의 ordinal로 레코드 조회 (센티넬이면 None)
    pub fn resolve(&self, hit: &SearchHit) -> Option<&SchemeRecord> {
        hit.ordinal().and_then(|i| self.records.get(i))
    }

    /// 이름으로 레코드 조회 (정확히 일치)
    pub fn get_by_name(&self, name: &str) -> Option<&SchemeRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// 저장용 (레코드, 벡터) 순회
    pub fn pairs(&self) -> impl Iterator<Item = (&SchemeRecord, &[f32])> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| self.index.vector(i).map(|v| (r, v)))
    }
}

/// 레코드 목록 지문
fn fingerprint(records: &[SchemeRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        for field in [
            &record.scheme_name,
            &record.category,
            &record.tags,
            &record.details,
            &record.eligibility,
            &record.benefits,
            &record.application,
            &record.documents,
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
