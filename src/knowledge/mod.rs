//! Knowledge 모듈 - 제도 벡터 인덱스와 아티팩트
//!
//! - VectorIndex: 내적 기반 flat k-NN (센티넬 `-1` 패딩)
//! - IndexedCorpus: 레코드·벡터 쌍 구조 (ordinal 불변식)
//! - ArtifactStore: SQLite 아티팩트 저장/로드

mod indexed;
mod store;
mod vector;

// Re-exports
pub use indexed::{IndexMeta, IndexedCorpus};
pub use store::{ArtifactStore, StoreStats};
pub use vector::{dot_product, SearchHit, VectorIndex, SENTINEL_INDEX};
