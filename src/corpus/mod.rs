//! 제도 코퍼스 - 제도 레코드와 로딩
//!
//! 원본 데이터셋(CSV, JSON 배열 또는 JSON Lines)을 읽어 `SchemeRecord` 목록으로 만듭니다.
//! - `schemeCategory` 컬럼은 `category`로 받습니다.
//! - 누락/`null` 필드는 빈 문자열이 됩니다 (이후 연결·파싱이 실패하지 않도록).

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// SchemeRecord
// ============================================================================

/// 제도 레코드 (인덱싱 후 불변)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub scheme_name: String,
    #[serde(default, alias = "schemeCategory", deserialize_with = "string_or_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub tags: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub details: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub eligibility: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub benefits: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub application: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub documents: String,
}

impl SchemeRecord {
    /// 임베딩용 결합 텍스트
    ///
    /// 이름과 태그가 앞에 오도록 구성합니다.
    pub fn search_text(&self) -> String {
        format!(
            "Scheme Name: {}. Category: {}. Tags: {}. Details: {}",
            self.scheme_name, self.category, self.tags, self.details
        )
    }

    /// 자격 판정용 텍스트 (eligibility + details)
    pub fn eligibility_text(&self) -> String {
        format!("{} {}", self.eligibility, self.details)
    }
}

/// null, 숫자, 불리언도 문자열로 받기
fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

// ============================================================================
// Loading
// ============================================================================

/// 파일에서 코퍼스 로드
///
/// 확장자가 `.csv`이면 CSV, 그 외에는 첫 비공백 문자가 `[`이면 JSON 배열,
/// 아니면 JSON Lines로 해석합니다.
pub fn load_corpus(path: &Path) -> Result<Vec<SchemeRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {:?}", path))?;

    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        parse_csv_corpus(&raw)?
    } else {
        parse_corpus(&raw)?
    };
    tracing::info!("Loaded {} schemes from {:?}", records.len(), path);
    Ok(records)
}

/// 문자열에서 코퍼스 파싱
pub fn parse_corpus(raw: &str) -> Result<Vec<SchemeRecord>> {
    let parsed: Vec<SchemeRecord> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw).context("Failed to parse corpus JSON array")?
    } else {
        let mut rows = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SchemeRecord>(line) {
                Ok(record) => rows.push(record),
                // 깨진 줄은 건너뜀
                Err(e) => tracing::warn!("Skipping malformed line {}: {}", line_no + 1, e),
            }
        }
        rows
    };

    Ok(clean_records(parsed))
}

/// CSV 코퍼스 파싱 (헤더 행 필수)
///
/// 필드 수가 헤더와 다르거나 읽을 수 없는 행은 경고 후 건너뜁니다.
/// 헤더에 없는 열(`level` 등)은 무시합니다.
pub fn parse_csv_corpus(raw: &str) -> Result<Vec<SchemeRecord>> {
    let mut reader = csv::Reader::from_reader(raw.as_bytes());
    reader.headers().context("Failed to read corpus CSV header")?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.deserialize::<SchemeRecord>().enumerate() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) => tracing::warn!("Skipping malformed CSV row {}: {}", row_no + 1, e),
        }
    }

    Ok(clean_records(rows))
}

/// 이름 없는 레코드 제거, 공백 정리, 중복 이름 경고
fn clean_records(records: Vec<SchemeRecord>) -> Vec<SchemeRecord> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(records.len());

    for mut record in records {
        record.scheme_name = record.scheme_name.trim().to_string();
        if record.scheme_name.is_empty() {
            tracing::warn!("Skipping scheme record without a name");
            continue;
        }
        if !seen.insert(record.scheme_name.clone()) {
            tracing::warn!(
                "Duplicate scheme name '{}': lookup resolves to the first entry",
                record.scheme_name
            );
        }
        cleaned.push(record);
    }

    cleaned
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array_with_alias_and_nulls() {
        let raw = r#"[
            {"scheme_name": "Atal Pension Yojana", "schemeCategory": "Pension",
             "tags": null, "details": "Pension for workers", "eligibility": "18 to 40 years"}
        ]"#;

        let records = parse_corpus(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "Pension");
        assert_eq!(records[0].tags, "");
        assert_eq!(records[0].benefits, "");
        assert_eq!(records[0].documents, "");
    }

    #[test]
    fn test_parse_json_lines() {
        let raw = "{\"scheme_name\": \"A\", \"details\": \"one\"}\n\n\
                   not json\n\
                   {\"scheme_name\": \"B\", \"benefits\": 5000}\n";

        let records = parse_corpus(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].scheme_name, "B");
        assert_eq!(records[1].benefits, "5000");
    }

    #[test]
    fn test_parse_csv_with_alias_and_empty_cells() {
        let raw = "scheme_name,schemeCategory,tags,details,eligibility,benefits,application,documents,level\n\
                   PM Kisan,Agriculture,\"farmer, income support\",Income support for farmers,,Rs 6000 per year,,,Central\n\
                   Broken row,only two\n\
                   Atal Pension Yojana,Pension,,\"Pension for workers\nin unorganised sector\",18 to 40 years,,,,Central\n";

        let records = parse_csv_corpus(raw).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].scheme_name, "PM Kisan");
        assert_eq!(records[0].category, "Agriculture");
        assert_eq!(records[0].tags, "farmer, income support");
        assert_eq!(records[0].eligibility, "");
        assert_eq!(records[0].documents, "");

        assert_eq!(records[1].scheme_name, "Atal Pension Yojana");
        assert_eq!(records[1].tags, "");
        assert_eq!(records[1].details, "Pension for workers\nin unorganised sector");
        assert_eq!(records[1].eligibility, "18 to 40 years");
    }

    #[test]
    fn test_load_csv_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schemes.CSV");
        std::fs::write(&path, "scheme_name,schemeCategory\nPM Awas,Housing\n").unwrap();

        let records = load_corpus(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "Housing");
    }

    #[test]
    fn test_nameless_records_are_dropped() {
        let raw = r#"[{"scheme_name": "  "}, {"details": "orphan"}, {"scheme_name": " X "}]"#;
        let records = parse_corpus(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scheme_name, "X");
    }

    #[test]
    fn test_search_text_layout() {
        let record = SchemeRecord {
            scheme_name: "PM Kisan".to_string(),
            category: "Agriculture".to_string(),
            tags: "farmer, income support".to_string(),
            details: "Income support to farmers".to_string(),
            ..Default::default()
        };

        assert_eq!(
            record.search_text(),
            "Scheme Name: PM Kisan. Category: Agriculture. Tags: farmer, income support. \
             Details: Income support to farmers"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_corpus(Path::new("/nonexistent/schemes.json"));
        assert!(result.is_err());
    }
}
