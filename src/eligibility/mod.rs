//! Eligibility 모듈 - 자격 요건 추출 및 판정
//!
//! - rules: 자유 텍스트 → 나이/소득/카테고리 제약 (정규식)
//! - evaluator: 프로필 vs 제약 → ELIGIBLE / NOT ELIGIBLE + 사유
//!
//! 최선 노력(heuristic) 필터이며, 서류 확인을 대체하지 않습니다.

mod evaluator;
mod rules;

// Re-exports
pub use evaluator::{EligibilityEvaluator, Evaluation, UserProfile, Verdict, ADVISORY_REASON};
pub use rules::{
    AgeLimit, CategoryMarkers, ConstraintSet, PatternRuleExtractor, RuleExtractor,
    DEFAULT_OPEN_AGE_CEILING,
};
