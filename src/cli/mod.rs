//! CLI 모듈
//!
//! scheme-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, EmbedderKind};
use crate::corpus::load_corpus;
use crate::eligibility::{UserProfile, Verdict};
use crate::embedding::{create_embedder, has_api_key};
use crate::error::ServiceError;
use crate::knowledge::ArtifactStore;
use crate::retrieval::{build_corpus, SearchStatus};
use crate::serving::ServingContext;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "scheme-rag")]
#[command(version, about = "정부 복지 제도 검색 및 자격 판정", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// 환경변수 설정을 덮어쓰는 전역 옵션
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// 아티팩트 파일 경로
    #[arg(long, global = true)]
    pub artifact: Option<PathBuf>,

    /// 임베딩 프로바이더 (gemini | local)
    #[arg(long, global = true)]
    pub embedder: Option<EmbedderKind>,

    /// 관련성 임계값
    #[arg(long, global = true)]
    pub relevance_floor: Option<f32>,
}

impl ConfigOverrides {
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(ref artifact) = self.artifact {
            config.artifact_path = artifact.clone();
        }
        if let Some(embedder) = self.embedder {
            config.embedder = embedder;
        }
        if let Some(floor) = self.relevance_floor {
            config.relevance_floor = floor;
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 코퍼스 파일(CSV / JSON / JSONL)로 인덱스 아티팩트 빌드
    Build {
        /// 코퍼스 파일 경로
        #[arg(short, long)]
        corpus: PathBuf,
    },

    /// 제도 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 (기본: SCHEME_RAG_TOP_K)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 자격 판정
    Verify {
        /// 제도 이름 (정확히 일치)
        scheme: String,

        #[command(flatten)]
        profile: ProfileArgs,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

/// 사용자 프로필 옵션
#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub income: Option<f64>,
    #[arg(long)]
    pub gender: Option<String>,
    /// SC / ST / OBC / general
    #[arg(long)]
    pub caste: Option<String>,
    #[arg(long)]
    pub occupation: Option<String>,
}

impl From<ProfileArgs> for UserProfile {
    fn from(args: ProfileArgs) -> Self {
        Self {
            age: args.age,
            income: args.income,
            gender: args.gender,
            caste: args.caste,
            occupation: args.occupation,
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.overrides.apply(AppConfig::from_env()?);

    match cli.command {
        Commands::Build { corpus } => cmd_build(&config, corpus).await,
        Commands::Search { query, top_k, json } => cmd_search(&config, &query, top_k, json).await,
        Commands::Verify {
            scheme,
            profile,
            json,
        } => cmd_verify(&config, &scheme, profile.into(), json),
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 빌드 명령어 (build)
///
/// 코퍼스를 읽어 임베딩하고 레코드와 함께 한 파일로 저장합니다.
async fn cmd_build(config: &AppConfig, corpus_path: PathBuf) -> Result<()> {
    println!("[*] 코퍼스 로드 중: {}", corpus_path.display());
    let records = load_corpus(&corpus_path).context("코퍼스 로드 실패")?;

    if records.is_empty() {
        println!("[!] 인덱싱할 제도가 없습니다.");
        return Ok(());
    }

    let embedder = create_embedder(config).context("임베더 생성 실패")?;
    println!(
        "[*] 임베딩 생성 중: {} 건 ({}, dim={})",
        records.len(),
        embedder.name(),
        embedder.dimension()
    );

    let corpus = build_corpus(records, embedder.as_ref())
        .await
        .context("인덱스 빌드 실패")?;

    let store = ArtifactStore::open(&config.artifact_path).context("아티팩트 저장소 열기 실패")?;
    store.save(&corpus).context("아티팩트 저장 실패")?;

    println!("[OK] 인덱스 빌드 완료: {} 건", corpus.len());
    println!("     아티팩트: {}", config.artifact_path.display());
    println!("     지문: {}", &corpus.meta().fingerprint[..16]);

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    config: &AppConfig,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let ctx = ServingContext::load(config);
    let top_k = top_k.unwrap_or(config.default_top_k);

    if !json {
        println!("[*] 검색 중: \"{}\"", query);
    }

    let outcome = ctx.search(query, top_k).await.map_err(describe)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.status == SearchStatus::NoRelevantSchemes {
        println!("\n[!] 관련 제도를 찾지 못했습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", outcome.results.len());

    for (i, result) in outcome.results.iter().enumerate() {
        println!("{}. [점수: {:.4}] {}", i + 1, result.score, result.scheme_name);
        if !result.category.is_empty() {
            println!("   분류: {}", result.category);
        }
        if !result.benefits.is_empty() {
            println!("   혜택: {}", single_line(&result.benefits));
        }
        println!("   내용: {}", single_line(&result.details));
        println!();
    }

    Ok(())
}

/// 판정 명령어 (verify)
fn cmd_verify(config: &AppConfig, scheme: &str, profile: UserProfile, json: bool) -> Result<()> {
    let ctx = ServingContext::load(config);
    let response = ctx.verify(scheme, &profile).map_err(describe)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let marker = match response.verdict {
        Verdict::Eligible => "[OK]",
        Verdict::NotEligible => "[!]",
    };
    println!("{} {}: {}", marker, response.scheme_summary.name, response.verdict);

    for reason in &response.reasons {
        println!("   - {}", reason);
    }
    if let Some(ref advisory) = response.gender_advisory {
        println!("   참고: {}", advisory);
    }

    println!();
    println!("   필요 서류: {}", single_line(&response.scheme_summary.documents));
    println!("   신청 방법: {}", single_line(&response.scheme_summary.application));

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("scheme-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 아티팩트: {}", config.artifact_path.display());
    println!(
        "[*] 임베더: {:?} (API 키: {})",
        config.embedder,
        if has_api_key() { "설정됨" } else { "미설정" }
    );
    println!("[*] 관련성 임계값: {}", config.relevance_floor);

    if !config.artifact_path.exists() {
        println!("[!] 아티팩트 없음. 실행: scheme-rag build --corpus <file>");
        return Ok(());
    }

    match ArtifactStore::open(&config.artifact_path).and_then(|s| Ok((s.load_meta()?, s.stats()?)))
    {
        Ok((Some(meta), stats)) => {
            println!(
                "[OK] 인덱스: {} 건 ({}, dim={})",
                meta.scheme_count, meta.embedder, meta.dimension
            );
            println!("     빌드 시각: {}", meta.built_at.format("%Y-%m-%d %H:%M"));
            println!("     텍스트: {}", format_bytes(stats.total_text_bytes));
        }
        Ok((None, _)) => println!("[!] 아티팩트가 비어 있습니다."),
        Err(e) => println!("[!] 아티팩트 열기 실패: {}", e),
    }

    match ServingContext::load(config) {
        ServingContext::Ready(_) => println!("[OK] 서비스 준비 완료"),
        ServingContext::NotReady { reason } => println!("[!] 서비스 미준비: {}", reason),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 서비스 에러를 CLI 메시지로 변환
fn describe(err: ServiceError) -> anyhow::Error {
    match err {
        ServiceError::NotReady(reason) => anyhow::anyhow!("서비스가 준비되지 않았습니다: {}", reason),
        ServiceError::NotFound(name) => anyhow::anyhow!("제도를 찾을 수 없습니다: '{}'", name),
        other => anyhow::Error::new(other),
    }
}

/// 줄바꿈 제거
fn single_line(text: &str) -> String {
    text.replace('\r', "").replace('\n', " ").trim().to_string()
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("hello\nworld"), "hello world");
        assert_eq!(single_line("  a\r\nb "), "a b");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_parse_verify_command() {
        let cli = Cli::try_parse_from([
            "scheme-rag",
            "verify",
            "Atal Pension Yojana",
            "--age",
            "30",
            "--caste",
            "OBC",
            "--embedder",
            "local",
        ])
        .unwrap();

        assert_eq!(cli.overrides.embedder, Some(EmbedderKind::Local));
        match cli.command {
            Commands::Verify { scheme, profile, json } => {
                assert_eq!(scheme, "Atal Pension Yojana");
                assert!(!json);
                let profile: UserProfile = profile.into();
                assert_eq!(profile.age, Some(30));
                assert_eq!(profile.caste.as_deref(), Some("OBC"));
                assert!(profile.income.is_none());
            }
            _ => panic!("expected verify command"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ConfigOverrides {
            artifact: Some(PathBuf::from("/tmp/a.db")),
            embedder: None,
            relevance_floor: Some(0.5),
        };
        let config = overrides.apply(AppConfig::from_lookup(|_| None, false).unwrap());
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/a.db"));
        assert!((config.relevance_floor - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.embedder, EmbedderKind::Local);
    }

    #[test]
    fn test_describe_keeps_not_found_name() {
        let err = describe(ServiceError::NotFound("PM Awas".to_string()));
        assert!(err.to_string().contains("PM Awas"));
    }
}
