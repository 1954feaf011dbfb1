//! 서비스 에러 타입
//!
//! 검색/판정 요청 단위로 발생하는 실패를 구분합니다.
//! 패턴 미매칭(ExtractionMiss)은 에러가 아니라 "제약 없음" 값으로 표현됩니다.

use thiserror::Error;

/// 요청 처리 에러
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 인덱스/코퍼스/임베더가 아직 로드되지 않음
    #[error("service not ready: {0}")]
    NotReady(String),

    /// 코퍼스에 없는 제도 이름
    #[error("scheme not found: {0}")]
    NotFound(String),

    /// 정규화할 수 없는 쿼리 (빈 문자열, 영벡터 등)
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// 임베딩 프로바이더 호출 실패
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}

impl ServiceError {
    /// HTTP 계층에서 사용할 상태 코드 힌트
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotReady(_) => 503,
            ServiceError::NotFound(_) => 404,
            ServiceError::DegenerateInput(_) => 422,
            ServiceError::Embedding(_) => 502,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
