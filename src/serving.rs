//! Serving Context - 요청 처리용 불변 상태
//!
//! 시작 시 한 번 구성하고 모든 요청에 참조로 넘깁니다.
//! 아티팩트/임베더가 준비되지 않았으면 `NotReady` 상태이며,
//! 이때의 요청은 "결과 없음"과 구분되는 `ServiceError::NotReady`로 실패합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::AppConfig;
use crate::corpus::SchemeRecord;
use crate::eligibility::{EligibilityEvaluator, PatternRuleExtractor, UserProfile, Verdict};
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::{ServiceError, ServiceResult};
use crate::knowledge::{ArtifactStore, IndexedCorpus};
use crate::retrieval::{SchemeRetriever, SearchOutcome};

// ============================================================================
// Types
// ============================================================================

/// 판정 응답의 제도 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeSummary {
    pub name: String,
    pub benefits: String,
    pub documents: String,
    pub application: String,
}

impl SchemeSummary {
    fn from_record(record: &SchemeRecord) -> Self {
        Self {
            name: record.scheme_name.clone(),
            benefits: or_placeholder(&record.benefits, "No benefits listed"),
            documents: or_placeholder(&record.documents, "No documents listed"),
            application: or_placeholder(&record.application, "No steps listed"),
        }
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// 판정 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyResponse {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_advisory: Option<String>,
    pub scheme_summary: SchemeSummary,
}

/// 준비 완료 상태
pub struct ReadyContext {
    retriever: SchemeRetriever,
    evaluator: EligibilityEvaluator,
    default_top_k: usize,
}

/// 서비스 상태
#[derive(Clone)]
pub enum ServingContext {
    NotReady { reason: String },
    Ready(Arc<ReadyContext>),
}

// ============================================================================
// ServingContext
// ============================================================================

impl ServingContext {
    /// 설정에 따라 아티팩트와 임베더를 로드
    ///
    /// 실패해도 에러 대신 `NotReady`를 반환합니다.
    pub fn load(config: &AppConfig) -> Self {
        match Self::try_load(config) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("Serving context not ready: {:#}", e);
                Self::NotReady {
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    fn try_load(config: &AppConfig) -> Result<Self> {
        if !config.artifact_path.exists() {
            return Ok(Self::NotReady {
                reason: format!(
                    "artifact not found at {}; run `scheme-rag build` first",
                    config.artifact_path.display()
                ),
            });
        }

        let store = ArtifactStore::open(&config.artifact_path)
            .context("Failed to open artifact store")?;
        let corpus = match store.load()? {
            Some(corpus) => corpus,
            None => {
                return Ok(Self::NotReady {
                    reason: "artifact is empty; run `scheme-rag build` first".to_string(),
                })
            }
        };

        let embedder = create_embedder(config)?;
        Self::from_parts(corpus, embedder, config)
    }

    /// 로드된 코퍼스와 임베더로 구성
    ///
    /// 빌드에 사용한 임베더와 이름이 다르면 점수가 비교 불가능하므로 `NotReady`입니다.
    pub fn from_parts(
        corpus: IndexedCorpus,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &AppConfig,
    ) -> Result<Self> {
        if corpus.meta().embedder != embedder.name() {
            return Ok(Self::NotReady {
                reason: format!(
                    "index was built with '{}' but the configured embedder is '{}'",
                    corpus.meta().embedder,
                    embedder.name()
                ),
            });
        }

        let retriever = SchemeRetriever::new(Arc::new(corpus), embedder, config.relevance_floor)?;
        let evaluator = EligibilityEvaluator::new(Box::new(PatternRuleExtractor::new(
            config.open_age_ceiling,
        )));

        tracing::info!(
            "Serving context ready ({} schemes, extractor={})",
            retriever.corpus().len(),
            evaluator.extractor().name()
        );

        Ok(Self::Ready(Arc::new(ReadyContext {
            retriever,
            evaluator,
            default_top_k: config.default_top_k,
        })))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    fn ready(&self) -> ServiceResult<&ReadyContext> {
        match self {
            Self::Ready(ctx) => Ok(ctx.as_ref()),
            Self::NotReady { reason } => Err(ServiceError::NotReady(reason.clone())),
        }
    }

    /// 설정된 기본 결과 수 (준비되지 않았으면 None)
    pub fn default_top_k(&self) -> Option<usize> {
        self.ready().ok().map(|ctx| ctx.default_top_k)
    }

    /// 제도 검색
    pub async fn search(&self, query: &str, top_k: usize) -> ServiceResult<SearchOutcome> {
        self.ready()?.retriever.search_schemes(query, top_k).await
    }

    /// 자격 판정 (요청마다 제약을 다시 추출)
    pub fn verify(&self, scheme_name: &str, profile: &UserProfile) -> ServiceResult<VerifyResponse> {
        let ctx = self.ready()?;

        let record = ctx
            .retriever
            .corpus()
            .get_by_name(scheme_name)
            .ok_or_else(|| ServiceError::NotFound(scheme_name.to_string()))?;

        let evaluation = ctx.evaluator.check_eligibility(record, profile);
        tracing::debug!(
            "Verified '{}': {} ({} reasons)",
            scheme_name,
            evaluation.verdict,
            evaluation.reasons.len()
        );

        Ok(VerifyResponse {
            verdict: evaluation.verdict,
            reasons: evaluation.reasons,
            gender_advisory: evaluation.gender_advisory,
            scheme_summary: SchemeSummary::from_record(record),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
