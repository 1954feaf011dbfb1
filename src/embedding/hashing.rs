//! 로컬 해싱 임베딩
//!
//! 단어와 문자 trigram을 SHA-256으로 해싱해 고정 차원 벡터에 누적합니다.
//! 네트워크 없이 결정적으로 동작하므로 오프라인 빌드와 테스트에 사용합니다.
//! 해시 출력이 Rust 버전과 무관하므로 저장된 아티팩트와 호환됩니다.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

/// 기본 차원 (MiniLM 계열과 동일)
pub const DEFAULT_HASH_DIMENSION: usize = 384;

const WORD_WEIGHT: f32 = 2.0;
const TRIGRAM_WEIGHT: f32 = 1.0;

/// Feature hashing 임베딩
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid dimension: 0");
        }
        Ok(Self { dimension })
    }

    /// 동기 인코딩 (정규화하지 않은 원본 벡터)
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.accumulate(&mut vector, word.as_bytes(), WORD_WEIGHT);

            // 경계 표시를 붙여 짧은 단어도 trigram을 갖도록 함
            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bucket);

        let pos = (hash % self.dimension as u64) as usize;
        // 부호 비트로 충돌 편향 상쇄
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[pos] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_normalize;
    use crate::knowledge::dot_product;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedding::new(DEFAULT_HASH_DIMENSION).unwrap();
        let a = embedder.encode("Pension scheme for senior citizens");
        let b = embedder.encode("Pension scheme for senior citizens");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASH_DIMENSION);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedding::new(64).unwrap();
        let v = embedder.encode("   ");
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashEmbedding::new(DEFAULT_HASH_DIMENSION).unwrap();

        let mut query = embedder.encode("scholarship for students");
        let mut related = embedder.encode("Post matric scholarship for students of SC category");
        let mut unrelated = embedder.encode("Crop insurance against drought for farmers");
        assert!(l2_normalize(&mut query));
        assert!(l2_normalize(&mut related));
        assert!(l2_normalize(&mut unrelated));

        assert!(dot_product(&query, &related) > dot_product(&query, &unrelated));
    }

    #[test]
    fn test_invalid_dimension() {
        assert!(HashEmbedding::new(0).is_err());
    }

    #[tokio::test]
    async fn test_embed_matches_encode() {
        let embedder = HashEmbedding::new(128).unwrap();
        let via_trait = embedder.embed("widow pension").await.unwrap();
        assert_eq!(via_trait, embedder.encode("widow pension"));
    }
}
