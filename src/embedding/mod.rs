//! 임베딩 모듈 - 텍스트 → 고정 차원 벡터
//!
//! 코퍼스 인덱스 빌드와 쿼리 인코딩에 **같은** 프로바이더를 사용해야
//! 점수가 비교 가능합니다. 아티팩트에 프로바이더 이름과 차원이 기록되며,
//! 로드 시 불일치하면 서비스가 준비되지 않은 상태로 남습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config)?;
//! let mut v = embedder.embed("pension for farmers").await?;
//! l2_normalize(&mut v);
//! ```

mod gemini;
mod hashing;

pub use gemini::{GeminiEmbedding, GEMINI_DIMENSIONS};
pub use hashing::{HashEmbedding, DEFAULT_HASH_DIMENSION};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{AppConfig, EmbedderKind};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 같은 입력에 대해 항상 같은 벡터를 반환해야 합니다.
/// 빈 문자열도 에러가 아닌 (영)벡터를 반환합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름 (아티팩트 메타데이터에 기록)
    fn name(&self) -> &str;
}

// ============================================================================
// Normalization
// ============================================================================

/// L2 정규화 (in-place)
///
/// 크기가 0이거나 유한하지 않으면 벡터를 건드리지 않고 `false`를 반환합니다.
/// 영벡터를 나누면 NaN이 점수로 퍼지므로 호출자가 반드시 확인해야 합니다.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return false;
    }

    for x in vector.iter_mut() {
        *x /= norm;
    }
    true
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embedder {
        EmbedderKind::Gemini => Arc::new(GeminiEmbedding::from_env()?),
        EmbedderKind::Local => Arc::new(HashEmbedding::new(DEFAULT_HASH_DIMENSION)?),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_is_rejected() {
        let mut v = vec![0.0; 8];
        assert!(!l2_normalize(&mut v));
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_l2_normalize_nan_is_rejected() {
        let mut v = vec![f32::NAN, 1.0];
        assert!(!l2_normalize(&mut v));
    }

    #[test]
    fn test_local_factory() {
        let config = AppConfig::from_lookup(|_| None, false).unwrap();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), DEFAULT_HASH_DIMENSION);
        assert_eq!(embedder.name(), "local-hash");
    }
}
