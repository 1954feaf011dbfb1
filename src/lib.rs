//! scheme-rag - 정부 복지 제도 시맨틱 검색 + 자격 판정
//!
//! 제도 코퍼스를 벡터 인덱스로 만들어 자유 텍스트 쿼리에 답하고,
//! 자격 요건 문장에서 나이/소득/카테고리 제약을 추출해 사용자 프로필을 판정합니다.
//! 판정은 최선 노력 휴리스틱이며 서류 확인을 대체하지 않습니다.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod eligibility;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod retrieval;
pub mod serving;

// Re-exports
pub use config::{get_data_dir, AppConfig, EmbedderKind};
pub use corpus::{load_corpus, parse_corpus, parse_csv_corpus, SchemeRecord};
pub use eligibility::{
    AgeLimit, CategoryMarkers, ConstraintSet, EligibilityEvaluator, Evaluation,
    PatternRuleExtractor, RuleExtractor, UserProfile, Verdict,
};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, l2_normalize, EmbeddingProvider, GeminiEmbedding,
    HashEmbedding,
};
pub use error::{ServiceError, ServiceResult};
pub use knowledge::{ArtifactStore, IndexMeta, IndexedCorpus, SearchHit, VectorIndex};
pub use retrieval::{build_corpus, SchemeMatch, SchemeRetriever, SearchOutcome, SearchStatus};
pub use serving::{SchemeSummary, ServingContext, VerifyResponse};
