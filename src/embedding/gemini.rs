//! Google Gemini 임베딩 프로바이더
//!
//! source: https://ai.google.dev/gemini-api/docs/embeddings
//!
//! 코퍼스 빌드와 쿼리 모두 `SEMANTIC_SIMILARITY` 태스크로 호출하여
//! 같은 벡터 공간을 보장합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{get_api_key, EmbeddingProvider};

const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

const GEMINI_MODEL: &str = "models/gemini-embedding-001";

/// MRL로 지원되는 출력 차원
pub const GEMINI_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

const DEFAULT_DIMENSION: usize = 768;

/// 무료 티어 60 RPM
const RATE_LIMIT_RPM: usize = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MIN_DELAY: Duration = Duration::from_millis(1000);

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// Rate Limiter
// ============================================================================

/// 슬라이딩 윈도우 + 최소 간격 리미터
#[derive(Debug)]
struct RateLimiter {
    sent: Vec<Instant>,
    last: Option<Instant>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            sent: Vec::new(),
            last: None,
        }
    }

    async fn acquire(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < MIN_DELAY {
                tokio::time::sleep(MIN_DELAY - elapsed).await;
            }
        }

        let now = Instant::now();
        self.sent.retain(|&t| now.duration_since(t) < RATE_LIMIT_WINDOW);

        if self.sent.len() >= RATE_LIMIT_RPM {
            if let Some(&oldest) = self.sent.first() {
                let wait = RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                let now = Instant::now();
                self.sent.retain(|&t| now.duration_since(t) < RATE_LIMIT_WINDOW);
            }
        }

        let now = Instant::now();
        self.sent.push(now);
        self.last = Some(now);
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    task_type: &'a str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: [EmbedPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// 단일 시도 결과
enum Attempt {
    Done(Vec<f32>),
    Retry(anyhow::Error),
}

// ============================================================================
// GeminiEmbedding
// ============================================================================

/// Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl GeminiEmbedding {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성 (768, 1536, 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if !GEMINI_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be one of {:?}",
                dimension,
                GEMINI_DIMENSIONS
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            limiter: Arc::new(Mutex::new(RateLimiter::new())),
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    async fn send_once(&self, text: &str) -> Result<Attempt> {
        let request = EmbedRequest {
            model: GEMINI_MODEL,
            content: EmbedContent {
                parts: [EmbedPart { text }],
            },
            task_type: "SEMANTIC_SIMILARITY",
            output_dimensionality: self.dimension,
        };

        self.limiter.lock().await.acquire().await;

        // API 키는 URL이 아닌 헤더로 전송
        let response = match self
            .client
            .post(GEMINI_EMBED_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return Ok(Attempt::Retry(anyhow::anyhow!(
                    "Failed to send embedding request: {}",
                    e
                )))
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.is_success() {
            let parsed: EmbedResponse =
                serde_json::from_str(&body).context("Failed to parse embedding response")?;
            if parsed.embedding.values.len() != self.dimension {
                anyhow::bail!(
                    "Gemini returned {} dimensions, expected {}",
                    parsed.embedding.values.len(),
                    self.dimension
                );
            }
            return Ok(Attempt::Done(parsed.embedding.values));
        }

        if status.as_u16() == 429 {
            return Ok(Attempt::Retry(anyhow::anyhow!("Rate limit exceeded (429)")));
        }

        if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
            anyhow::bail!(
                "Gemini API error ({}): {}",
                error.error.status,
                error.error.message
            );
        }
        anyhow::bail!("Gemini API error ({}): {}", status, body)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트는 API 호출 없이 영벡터
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.send_once(text).await? {
                Attempt::Done(values) => return Ok(values),
                Attempt::Retry(e) => {
                    if attempt < MAX_RETRIES {
                        let backoff =
                            Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "{}; retrying in {:?} (attempt {}/{})",
                            e,
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // 배치 엔드포인트 대신 순차 호출 (리미터가 속도 조절)
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}
