//! Eligibility Evaluator - 사용자 프로필 vs 추출된 제약
//!
//! 네 가지 독립 검사(나이, 소득, 성별, 카테고리)를 수행합니다.
//! 각 검사는 판정을 NOT ELIGIBLE로 바꾸고 사유를 추가할 수만 있으며,
//! 한번 실패한 판정은 되돌려지지 않습니다.
//! 프로필에 값이 없으면 해당 검사는 건너뜁니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::corpus::SchemeRecord;

use super::rules::{PatternRuleExtractor, RuleExtractor};

/// 위반 사항이 없을 때의 안내 문구
pub const ADVISORY_REASON: &str =
    "Matches all extracted criteria (Age/Income). Please verify documents.";

// ============================================================================
// Types
// ============================================================================

/// 사용자 프로필 (모든 필드 선택)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub income: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    /// SC / ST / OBC / general (대소문자 무시)
    #[serde(default)]
    pub caste: Option<String>,
    /// 판정에는 사용하지 않음
    #[serde(default)]
    pub occupation: Option<String>,
}

impl UserProfile {
    fn gender(&self) -> Option<String> {
        non_blank(&self.gender).map(|g| g.to_lowercase())
    }

    fn caste(&self) -> Option<String> {
        non_blank(&self.caste).map(|c| c.to_uppercase())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "ELIGIBLE")]
    Eligible,
    #[serde(rename = "NOT ELIGIBLE")]
    NotEligible,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Eligible => "ELIGIBLE",
            Verdict::NotEligible => "NOT ELIGIBLE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 판정 결과 (사유 목록은 비어 있지 않음)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    /// 성별 관련 참고 신호 (판정에 영향 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_advisory: Option<String>,
}

// ============================================================================
// EligibilityEvaluator
// ============================================================================

/// 자격 판정기
pub struct EligibilityEvaluator {
    extractor: Box<dyn RuleExtractor>,
}

impl Default for EligibilityEvaluator {
    fn default() -> Self {
        Self::new(Box::new(PatternRuleExtractor::default()))
    }
}

impl EligibilityEvaluator {
    pub fn new(extractor: Box<dyn RuleExtractor>) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &dyn RuleExtractor {
        self.extractor.as_ref()
    }

    /// 제도 레코드 기준 판정 (eligibility + details 텍스트)
    pub fn check_eligibility(&self, scheme: &SchemeRecord, profile: &UserProfile) -> Evaluation {
        self.check_text(&scheme.eligibility_text(), profile)
    }

    /// 임의 텍스트 기준 판정
    pub fn check_text(&self, text: &str, profile: &UserProfile) -> Evaluation {
        let mut verdict = Verdict::Eligible;
        let mut reasons = Vec::new();
        let mut fail = |reason: String| {
            verdict = Verdict::NotEligible;
            reasons.push(reason);
        };

        // 1. 나이
        if let Some(age) = profile.age {
            if let Some((min, max)) = self.extractor.extract_age_limit(text).bounds() {
                if !(min..=max).contains(&age) {
                    fail(format!(
                        "Age {} is not within valid range {}-{}.",
                        age, min, max
                    ));
                }
            }
        }

        // 2. 소득
        if let Some(income) = profile.income {
            if let Some(limit) = self.extractor.extract_income_limit(text) {
                if income > limit {
                    fail(format!("Income {} exceeds limit of {}.", income, limit));
                }
            }
        }

        // 3. 성별 (참고용, 판정에 반영하지 않음)
        let gender_advisory = match profile.gender() {
            Some(gender) if gender == "male" && self.extractor.extract_women_targeted(text) => {
                tracing::debug!("Women-targeted wording detected for male profile");
                Some("Scheme text appears to target women; gender was not enforced.".to_string())
            }
            _ => None,
        };

        // 4. 카테고리 (SC 대상 제도는 ST도 허용, 반대는 아님)
        if let Some(caste) = profile.caste() {
            let markers = self.extractor.extract_category(text);

            if markers.requires_sc && caste != "SC" && caste != "ST" {
                fail(format!(
                    "Scheme is for SC/ST, but your category is {}",
                    caste
                ));
            }

            if markers.requires_st && caste != "ST" {
                fail(format!("Scheme is for ST, but your category is {}", caste));
            }
        }

        if reasons.is_empty() {
            return Evaluation {
                verdict: Verdict::Eligible,
                reasons: vec![ADVISORY_REASON.to_string()],
                gender_advisory,
            };
        }

        Evaluation {
            verdict,
            reasons,
            gender_advisory,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
