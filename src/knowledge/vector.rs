//! Vector Index - 내적 기반 최근접 이웃 검색
//!
//! 정규화된 벡터의 내적 = 코사인 유사도입니다.
//! 전체 스캔(flat) 방식이며 빌드 후 불변입니다.

use anyhow::Result;

/// 결과가 부족할 때 채워지는 센티넬 인덱스
pub const SENTINEL_INDEX: i64 = -1;

// ============================================================================
// Types
// ============================================================================

/// 검색 히트 (ordinal, 점수)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// 입력 벡터 순서 (센티넬이면 -1)
    pub index: i64,
    /// 내적 점수 (센티넬이면 의미 없음)
    pub score: f32,
}

impl SearchHit {
    fn sentinel() -> Self {
        Self {
            index: SENTINEL_INDEX,
            score: f32::NEG_INFINITY,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.index == SENTINEL_INDEX
    }

    /// 센티넬이 아니면 ordinal 반환
    pub fn ordinal(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 불변 flat 인덱스
///
/// 벡터를 연속 버퍼 하나에 저장합니다. `i`번째 행은 `build`에 넘긴 `i`번째 벡터입니다.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// 정규화된 벡터 목록으로 인덱스 빌드
    ///
    /// NaN / 무한대 값이 있으면 실패합니다.
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Index dimension must be positive");
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dimension {
                anyhow::bail!(
                    "Vector {} has dimension {}, expected {}",
                    i,
                    v.len(),
                    dimension
                );
            }
            if v.iter().any(|x| !x.is_finite()) {
                anyhow::bail!("Vector {} contains non-finite values", i);
            }
            data.extend_from_slice(v);
        }

        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `i`번째 벡터
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// k-NN 검색
    ///
    /// 점수 내림차순, 동점이면 낮은 ordinal 우선.
    /// 인덱스가 비어 있으면 빈 결과, `k`가 크기를 넘으면 `-1` 센티넬로 채웁니다.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }
        if query.len() != self.dimension {
            tracing::warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| SearchHit {
                index: i as i64,
                score: dot_product(query, row),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        hits.truncate(k);

        while hits.len() < k {
            hits.push(SearchHit::sentinel());
        }

        hits
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 내적 (길이가 다르면 0.0)
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.6, 0.8, 0.0],
        ]
    }

    #[test]
    fn test_search_orders_by_descending_score() {
        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        let hits = index.search(&[0.0, 1.0, 0.0], 3);

        let order: Vec<i64> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_scores_within_cosine_range() {
        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        for hit in index.search(&[-1.0, 0.0, 0.0], 3) {
            assert!((-1.0..=1.0).contains(&hit.score));
        }
    }

    #[test]
    fn test_k_larger_than_index_pads_with_sentinel() {
        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        let hits = index.search(&[1.0, 0.0, 0.0], 5);

        assert_eq!(hits.len(), 5);
        assert!(hits[..3].iter().all(|h| !h.is_sentinel()));
        assert!(hits[3..].iter().all(|h| h.is_sentinel() && h.ordinal().is_none()));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::build(3, &[]).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = VectorIndex::build(3, &[vec![1.0, 0.0]]);
        assert!(result.is_err());

        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        assert!(index.search(&[1.0, 0.0], 2).is_empty());
    }

    #[test]
    fn test_search_is_repeatable() {
        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        let query = [0.5, 0.5, 0.7071];
        assert_eq!(index.search(&query, 3), index.search(&query, 3));
    }

    #[test]
    fn test_non_finite_rows_rejected() {
        let mut vectors = vec![vec![1.0, 0.0]; 40];
        vectors[3] = vec![f32::NAN, f32::NAN];
        assert!(VectorIndex::build(2, &vectors).is_err());

        vectors[3] = vec![f32::INFINITY, 0.0];
        assert!(VectorIndex::build(2, &vectors).is_err());
    }

    #[test]
    fn test_nan_query_does_not_panic() {
        let vectors: Vec<Vec<f32>> = (0..40).map(|i| vec![1.0, i as f32 / 40.0]).collect();
        let index = VectorIndex::build(2, &vectors).unwrap();

        let hits = index.search(&[f32::NAN, 0.0], 5);
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| !h.is_sentinel()));
    }

    #[test]
    fn test_vector_lookup() {
        let index = VectorIndex::build(3, &unit_vectors()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.vector(2), Some(&[0.6, 0.8, 0.0][..]));
        assert_eq!(index.vector(3), None);
    }
}
