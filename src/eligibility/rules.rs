//! Rule Extractor - 자격 요건 문장에서 구조화된 제약 추출
//!
//! 카테고리별로 패턴을 우선순위대로 시도하고 첫 매칭을 사용합니다.
//! 매칭 실패는 에러가 아니라 "제약 없음"입니다.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// "above N years" 처럼 상한이 없는 조건에 쓰는 상한 대체값
///
/// 실제 나이 제한이 아니라 "상한 없음"을 나타내는 조정 가능한 값입니다.
pub const DEFAULT_OPEN_AGE_CEILING: u32 = 100;

// ============================================================================
// Patterns
// ============================================================================

/// "18 - 60 years", "18 to 60 years"
static AGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]{1,3})\s*(?:-|to)\s*([0-9]{1,3})\s*years?").unwrap());

/// "above 60 years", "more than 60 years"
static AGE_ABOVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:above|more than)\s*([0-9]{1,3})\s*years?").unwrap());

/// "below 18 years", "less than 18 years"
static AGE_BELOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:below|less than)\s*([0-9]{1,3})\s*years?").unwrap());

/// 정규화된 텍스트(소문자, 천 단위 구분자 제거, ₹ → "rs ") 기준
static INCOME_CEILING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:income|salary)\s*(?:should|must)?\s*(?:not exceed|less than|below|upto)\s*(?:rs\.?)?\s*([0-9]+)",
    )
    .unwrap()
});

/// 대문자 텍스트 기준 단독 토큰
///
/// 앞에는 공백, `/`, `(` 또는 텍스트 시작만 허용합니다 ("B.SC", "M.SC" 제외).
/// 뒤에는 공백, 구두점 또는 텍스트 끝을 허용합니다 ("SC/ST", "SC,").
static SC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s/(])SC(?:$|[\s/,.;:)])").unwrap());
static ST_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s/(])ST(?:$|[\s/,.;:)])").unwrap());

// ============================================================================
// Types
// ============================================================================

/// 나이 제한 (양쪽 모두 None이면 제약 없음)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgeLimit {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl AgeLimit {
    pub const UNCONSTRAINED: AgeLimit = AgeLimit {
        min: None,
        max: None,
    };

    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// 양쪽 경계가 모두 있을 때만 Some
    pub fn bounds(&self) -> Option<(u32, u32)> {
        self.min.zip(self.max)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// SC/ST 대상 표시 (서로 독립)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryMarkers {
    pub requires_sc: bool,
    pub requires_st: bool,
}

/// 추출된 자격 제약 (요청마다 재계산, 캐시하지 않음)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    pub age: AgeLimit,
    pub income_max: Option<f64>,
    pub category: CategoryMarkers,
    /// 여성 대상 표현 감지 (판정에는 사용하지 않음)
    pub women_targeted: bool,
}

// ============================================================================
// RuleExtractor Trait
// ============================================================================

/// 자유 텍스트 → 구조화된 제약
///
/// 패턴 세트를 바꿔도 평가 로직은 영향을 받지 않습니다.
pub trait RuleExtractor: Send + Sync {
    fn extract_age_limit(&self, text: &str) -> AgeLimit;

    fn extract_income_limit(&self, text: &str) -> Option<f64>;

    fn extract_category(&self, text: &str) -> CategoryMarkers;

    fn extract_women_targeted(&self, text: &str) -> bool;

    /// 전체 제약 추출
    fn extract(&self, text: &str) -> ConstraintSet {
        ConstraintSet {
            age: self.extract_age_limit(text),
            income_max: self.extract_income_limit(text),
            category: self.extract_category(text),
            women_targeted: self.extract_women_targeted(text),
        }
    }

    fn name(&self) -> &'static str;
}

// ============================================================================
// PatternRuleExtractor
// ============================================================================

/// 정규식 기반 추출기
#[derive(Debug, Clone)]
pub struct PatternRuleExtractor {
    open_age_ceiling: u32,
}

impl Default for PatternRuleExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_AGE_CEILING)
    }
}

impl PatternRuleExtractor {
    pub fn new(open_age_ceiling: u32) -> Self {
        Self { open_age_ceiling }
    }
}

impl RuleExtractor for PatternRuleExtractor {
    /// 범위 → 하한 → 상한 순서, 첫 매칭 사용
    fn extract_age_limit(&self, text: &str) -> AgeLimit {
        if let Some(caps) = AGE_RANGE.captures(text) {
            if let (Some(min), Some(max)) = (parse_capture(&caps, 1), parse_capture(&caps, 2)) {
                return AgeLimit::new(min, max);
            }
        }

        if let Some(min) = AGE_ABOVE
            .captures(text)
            .and_then(|caps| parse_capture(&caps, 1))
        {
            return AgeLimit::new(min, self.open_age_ceiling);
        }

        // "less than N" 은 N 미포함
        if let Some(limit) = AGE_BELOW
            .captures(text)
            .and_then(|caps| parse_capture(&caps, 1))
        {
            return AgeLimit::new(0, limit.saturating_sub(1));
        }

        AgeLimit::UNCONSTRAINED
    }

    /// "lakh", "crore" 단위는 확장하지 않음 (숫자 그대로)
    fn extract_income_limit(&self, text: &str) -> Option<f64> {
        let clean = text.to_lowercase().replace(',', "").replace('₹', "rs ");
        INCOME_CEILING
            .captures(&clean)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    fn extract_category(&self, text: &str) -> CategoryMarkers {
        let upper = text.to_uppercase();
        CategoryMarkers {
            requires_sc: upper.contains("SCHEDULED CASTE") || SC_TOKEN.is_match(&upper),
            requires_st: upper.contains("SCHEDULED TRIBE") || ST_TOKEN.is_match(&upper),
        }
    }

    fn extract_women_targeted(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        let mentions_women =
            lower.contains("women") || lower.contains("female") || lower.contains("girl");
        mentions_women && !lower.contains("men and women")
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

fn parse_capture(caps: &regex::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

// ============================================================================
// Tests
// ============================================================================
