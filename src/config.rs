//! 런타임 설정
//!
//! 기본값 → 환경변수 → CLI 플래그 순으로 덮어씁니다.
//!
//! | 환경변수 | 기본값 |
//! |---|---|
//! | `SCHEME_RAG_DATA_DIR` | `<data_local_dir>/.scheme-rag` |
//! | `SCHEME_RAG_ARTIFACT` | `<data_dir>/schemes.db` |
//! | `SCHEME_RAG_EMBEDDER` | API 키가 있으면 `gemini`, 없으면 `local` |
//! | `SCHEME_RAG_RELEVANCE_FLOOR` | `0.3` |
//! | `SCHEME_RAG_TOP_K` | `5` |
//! | `SCHEME_RAG_OPEN_AGE_CEILING` | `100` |

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::eligibility::DEFAULT_OPEN_AGE_CEILING;
use crate::embedding::has_api_key;
use crate::retrieval::{DEFAULT_RELEVANCE_FLOOR, DEFAULT_TOP_K};

/// 아티팩트 파일 이름
pub const ARTIFACT_FILE: &str = "schemes.db";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.scheme-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scheme-rag")
}

// ============================================================================
// Types
// ============================================================================

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Gemini API (네트워크 필요)
    Gemini,
    /// 로컬 해싱 임베딩 (오프라인, 결정적)
    Local,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(EmbedderKind::Gemini),
            "local" | "hash" => Ok(EmbedderKind::Local),
            other => bail!("Unknown embedder '{}'. Use 'gemini' or 'local'", other),
        }
    }
}

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub artifact_path: PathBuf,
    pub embedder: EmbedderKind,
    /// 최상위 결과가 이 점수 미만이면 "관련 제도 없음"
    pub relevance_floor: f32,
    pub default_top_k: usize,
    /// "above N years" 의 상한 대체값
    pub open_age_ceiling: u32,
}

impl AppConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), has_api_key())
    }

    /// 임의의 키 조회 함수로 설정 구성
    pub fn from_lookup<F>(lookup: F, api_key_present: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get("SCHEME_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        let artifact_path = get("SCHEME_RAG_ARTIFACT")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(ARTIFACT_FILE));

        let embedder = match get("SCHEME_RAG_EMBEDDER") {
            Some(v) => v.parse()?,
            None if api_key_present => EmbedderKind::Gemini,
            None => EmbedderKind::Local,
        };

        let relevance_floor = parse_var(&get, "SCHEME_RAG_RELEVANCE_FLOOR")?
            .unwrap_or(DEFAULT_RELEVANCE_FLOOR);
        if !relevance_floor.is_finite() {
            bail!("SCHEME_RAG_RELEVANCE_FLOOR must be a finite number");
        }

        let default_top_k = parse_var(&get, "SCHEME_RAG_TOP_K")?.unwrap_or(DEFAULT_TOP_K);
        let open_age_ceiling =
            parse_var(&get, "SCHEME_RAG_OPEN_AGE_CEILING")?.unwrap_or(DEFAULT_OPEN_AGE_CEILING);

        Ok(Self {
            data_dir,
            artifact_path,
            embedder,
            relevance_floor,
            default_top_k,
            open_age_ceiling,
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
        })
        .transpose()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)], api_key: bool) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned(), api_key)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[], false).unwrap();
        assert_eq!(config.embedder, EmbedderKind::Local);
        assert!((config.relevance_floor - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.open_age_ceiling, 100);
        assert!(config.artifact_path.ends_with(ARTIFACT_FILE));
    }

    #[test]
    fn test_api_key_selects_gemini() {
        let config = config_from(&[], true).unwrap();
        assert_eq!(config.embedder, EmbedderKind::Gemini);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(
            &[
                ("SCHEME_RAG_DATA_DIR", "/tmp/schemes"),
                ("SCHEME_RAG_EMBEDDER", "LOCAL"),
                ("SCHEME_RAG_RELEVANCE_FLOOR", "0.45"),
                ("SCHEME_RAG_TOP_K", "10"),
                ("SCHEME_RAG_OPEN_AGE_CEILING", "120"),
            ],
            true,
        )
        .unwrap();

        assert_eq!(config.embedder, EmbedderKind::Local);
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/schemes").join(ARTIFACT_FILE));
        assert!((config.relevance_floor - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.default_top_k, 10);
        assert_eq!(config.open_age_ceiling, 120);
    }

    #[test]
    fn test_malformed_number_is_error() {
        let result = config_from(&[("SCHEME_RAG_TOP_K", "five")], false);
        assert!(result.is_err());
        assert!(result
            .err()
            .map(|e| e.to_string().contains("SCHEME_RAG_TOP_K"))
            .unwrap_or(false));
    }

    #[test]
    fn test_unknown_embedder_is_error() {
        assert!(config_from(&[("SCHEME_RAG_EMBEDDER", "openai")], false).is_err());
    }
}
