//! Retrieval 모듈 - 쿼리 → 관련 제도 목록
//!
//! encode → normalize → k-NN → 센티넬 제거 → 스니펫 구성 → 임계값 적용.
//! 최상위 점수가 relevance floor 미만이면 저신뢰 결과 대신 빈 목록을 반환합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::corpus::SchemeRecord;
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::{ServiceError, ServiceResult};
use crate::knowledge::IndexedCorpus;

/// 기본 relevance floor (MiniLM 계열 점수 분포 기준, 인코더를 바꾸면 조정 필요)
pub const DEFAULT_RELEVANCE_FLOOR: f32 = 0.3;

/// 기본 결과 수
pub const DEFAULT_TOP_K: usize = 5;

const BENEFITS_PREVIEW_CHARS: usize = 100;
const DETAILS_SNIPPET_CHARS: usize = 200;

// ============================================================================
// Types
// ============================================================================

/// 검색 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "No relevant schemes found")]
    NoRelevantSchemes,
}

/// 검색 결과 한 건
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeMatch {
    pub scheme_name: String,
    /// 내적 점수 (대략 -1.0 ~ 1.0)
    pub score: f32,
    pub category: String,
    /// 앞 100자 미리보기
    pub benefits: String,
    /// 앞 200자 스니펫
    pub details: String,
    /// 전체 자격 요건 원문
    pub eligibility_text: String,
    /// 전체 신청 절차 원문
    pub application_steps: String,
}

impl SchemeMatch {
    fn from_record(record: &SchemeRecord, score: f32) -> Self {
        Self {
            scheme_name: record.scheme_name.clone(),
            score,
            category: record.category.clone(),
            benefits: preview(&record.benefits, BENEFITS_PREVIEW_CHARS),
            details: preview(&record.details, DETAILS_SNIPPET_CHARS),
            eligibility_text: record.eligibility.clone(),
            application_steps: record.application.clone(),
        }
    }
}

/// 검색 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub results: Vec<SchemeMatch>,
}

impl SearchOutcome {
    fn no_relevant() -> Self {
        Self {
            status: SearchStatus::NoRelevantSchemes,
            results: Vec::new(),
        }
    }
}

// ============================================================================
// SchemeRetriever
// ============================================================================

/// 제도 검색기
///
/// 코퍼스와 임베더는 읽기 전용으로 공유되므로 여러 요청에서 동시에 호출할 수 있습니다.
#[derive(Clone)]
pub struct SchemeRetriever {
    corpus: Arc<IndexedCorpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    relevance_floor: f32,
}

impl SchemeRetriever {
    /// 새 검색기 생성
    ///
    /// 임베더의 차원이 인덱스와 다르면 실패합니다.
    pub fn new(
        corpus: Arc<IndexedCorpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        relevance_floor: f32,
    ) -> Result<Self> {
        if embedder.dimension() != corpus.meta().dimension {
            anyhow::bail!(
                "Embedder dimension {} does not match index dimension {}",
                embedder.dimension(),
                corpus.meta().dimension
            );
        }

        Ok(Self {
            corpus,
            embedder,
            relevance_floor,
        })
    }

    pub fn corpus(&self) -> &IndexedCorpus {
        &self.corpus
    }

    pub fn relevance_floor(&self) -> f32 {
        self.relevance_floor
    }

    /// 쿼리로 제도 검색
    pub async fn search_schemes(&self, query: &str, top_k: usize) -> ServiceResult<SearchOutcome> {
        // 1. 쿼리 인코딩 + 정규화
        let mut query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(ServiceError::Embedding)?;

        if !l2_normalize(&mut query_vector) {
            tracing::warn!("Query produced a zero-magnitude embedding: {:?}", query);
            return Err(ServiceError::DegenerateInput(
                "query text produced a zero-magnitude embedding".to_string(),
            ));
        }

        // 2. k-NN
        let hits = self.corpus.index().search(&query_vector, top_k);

        // 3. 센티넬 제거 + 결과 구성
        let results: Vec<SchemeMatch> = hits
            .iter()
            .filter_map(|hit| {
                self.corpus
                    .resolve(hit)
                    .map(|record| SchemeMatch::from_record(record, hit.score))
            })
            .collect();

        // 4. 임계값
        match results.first() {
            Some(top) if top.score >= self.relevance_floor => {
                tracing::debug!(
                    "Search '{}': {} results (top score {:.4})",
                    query,
                    results.len(),
                    top.score
                );
                Ok(SearchOutcome {
                    status: SearchStatus::Success,
                    results,
                })
            }
            Some(top) => {
                tracing::debug!(
                    "Search '{}': top score {:.4} below floor {:.4}",
                    query,
                    top.score,
                    self.relevance_floor
                );
                Ok(SearchOutcome::no_relevant())
            }
            None => Ok(SearchOutcome::no_relevant()),
        }
    }
}

// ============================================================================
// Index Build
// ============================================================================

/// 레코드 목록을 인코딩하여 인덱스 코퍼스 빌드
///
/// 쿼리와 같은 방식으로 L2 정규화합니다. 영벡터는 그대로 저장되며
/// (어떤 쿼리와도 점수 0) 경고를 남깁니다. NaN / 무한대가 섞인 벡터는 빌드 실패입니다.
pub async fn build_corpus(
    records: Vec<SchemeRecord>,
    embedder: &dyn EmbeddingProvider,
) -> Result<IndexedCorpus> {
    let texts: Vec<String> = records.iter().map(SchemeRecord::search_text).collect();

    tracing::info!(
        "Generating embeddings for {} schemes with {}",
        texts.len(),
        embedder.name()
    );
    let vectors = embedder
        .embed_batch(&texts)
        .await
        .context("Failed to embed corpus")?;

    if vectors.len() != records.len() {
        anyhow::bail!(
            "Embedder returned {} vectors for {} schemes",
            vectors.len(),
            records.len()
        );
    }

    let mut pairs = Vec::with_capacity(records.len());
    for (record, mut vector) in records.into_iter().zip(vectors) {
        if vector.iter().any(|x| !x.is_finite()) {
            anyhow::bail!("Non-finite embedding for '{}'", record.scheme_name);
        }
        if !l2_normalize(&mut vector) {
            tracing::warn!("Zero-magnitude embedding for '{}'", record.scheme_name);
        }
        pairs.push((record, vector));
    }

    IndexedCorpus::from_pairs(embedder.name(), embedder.dimension(), pairs)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 앞 `max_chars`자 + 길면 "..." (UTF-8 안전)
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::HashEmbedding;

    /// 텍스트 → 고정 벡터 매핑 (테스트용)
    struct FixedEmbedding {
        vectors: HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0; self.dimension]))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn record(name: &str) -> SchemeRecord {
        SchemeRecord {
            scheme_name: name.to_string(),
            category: "Test".to_string(),
            benefits: "b".repeat(150),
            details: "short details".to_string(),
            eligibility: "full eligibility text".to_string(),
            application: "apply online".to_string(),
            ..Default::default()
        }
    }

    fn retriever_with_scores(scores: &[f32]) -> SchemeRetriever {
        // 쿼리 = e0, 문서 i = (s, sqrt(1 - s^2)) → 내적 = s
        let pairs = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (record(&format!("Scheme {}", i)), vec![s, (1.0 - s * s).sqrt()]))
            .collect();
        let corpus = IndexedCorpus::from_pairs("fixed", 2, pairs).unwrap();

        let embedder = FixedEmbedding {
            vectors: HashMap::from([("query".to_string(), vec![1.0, 0.0])]),
            dimension: 2,
        };

        SchemeRetriever::new(Arc::new(corpus), Arc::new(embedder), DEFAULT_RELEVANCE_FLOOR)
            .unwrap()
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let retriever = retriever_with_scores(&[0.3, 0.1]);
        let outcome = retriever.search_schemes("query", 5).await.unwrap();
        assert_eq!(outcome.status, SearchStatus::Success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].scheme_name, "Scheme 0");
    }

    #[tokio::test]
    async fn test_below_threshold_returns_empty() {
        let retriever = retriever_with_scores(&[0.2999, 0.1]);
        let outcome = retriever.search_schemes("query", 5).await.unwrap();
        assert_eq!(outcome.status, SearchStatus::NoRelevantSchemes);
        assert!(outcome.results.is_empty());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "No relevant schemes found");
    }

    #[tokio::test]
    async fn test_sentinels_are_not_surfaced() {
        let retriever = retriever_with_scores(&[0.9, 0.5]);
        let outcome = retriever.search_schemes("query", 10).await.unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.scheme_name.starts_with("Scheme")));
    }

    #[tokio::test]
    async fn test_result_fields() {
        let retriever = retriever_with_scores(&[0.9]);
        let outcome = retriever.search_schemes("query", 1).await.unwrap();
        let top = &outcome.results[0];

        assert_eq!(top.benefits.chars().count(), 103);
        assert!(top.benefits.ends_with("..."));
        assert_eq!(top.details, "short details");
        assert_eq!(top.eligibility_text, "full eligibility text");
        assert_eq!(top.application_steps, "apply online");
        assert!((top.score - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_degenerate_query_is_rejected() {
        let retriever = retriever_with_scores(&[0.9]);
        let result = retriever.search_schemes("unknown text", 3).await;
        assert!(matches!(result, Err(ServiceError::DegenerateInput(_))));
    }

    #[tokio::test]
    async fn test_empty_corpus_reports_no_relevant() {
        let corpus = IndexedCorpus::from_pairs("local-hash", 64, Vec::new()).unwrap();
        let embedder = HashEmbedding::new(64).unwrap();
        let retriever =
            SchemeRetriever::new(Arc::new(corpus), Arc::new(embedder), DEFAULT_RELEVANCE_FLOOR)
                .unwrap();

        let outcome = retriever.search_schemes("pension", 5).await.unwrap();
        assert_eq!(outcome.status, SearchStatus::NoRelevantSchemes);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let corpus = IndexedCorpus::from_pairs("local-hash", 64, Vec::new()).unwrap();
        let embedder = HashEmbedding::new(128).unwrap();
        assert!(SchemeRetriever::new(Arc::new(corpus), Arc::new(embedder), 0.3).is_err());
    }

    #[tokio::test]
    async fn test_build_corpus_normalizes_vectors() {
        let embedder = HashEmbedding::new(64).unwrap();
        let corpus = build_corpus(vec![record("A"), record("B")], &embedder)
            .await
            .unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.meta().embedder, "local-hash");
        for (_, v) in corpus.pairs() {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    /// 이름에 "Broken"이 들어간 레코드만 NaN 벡터를 반환
    struct BrokenEmbedding;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("Broken") {
                Ok(vec![f32::NAN, f32::NAN])
            } else if text.contains("Empty") {
                Ok(vec![0.0, 0.0])
            } else {
                Ok(vec![3.0, 4.0])
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_build_corpus_rejects_nan_rows() {
        let records = vec![record("A"), record("Broken"), record("C")];
        let err = build_corpus(records, &BrokenEmbedding).await.unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[tokio::test]
    async fn test_build_corpus_keeps_zero_rows() {
        let corpus = build_corpus(vec![record("A"), record("Empty")], &BrokenEmbedding)
            .await
            .unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.index().vector(1), Some(&[0.0, 0.0][..]));
        let hits = corpus.index().search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].index, 0);
        assert!((hits[0].score - 0.6).abs() < 1e-6);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("नमस्ते दुनिया", 3).chars().count(), 6);
        assert_eq!(preview("", 3), "");
    }
}
