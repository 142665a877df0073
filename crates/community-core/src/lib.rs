//! # Community Core
//!
//! 커뮤니티 플랫폼의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 다음을 포함합니다:
//! - 사용자, 역할, 권한 도메인 타입
//! - 설정 관리 (`config` 크레이트 기반)
//! - 로깅 인프라 (`tracing-subscriber`)
//! - 공통 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
