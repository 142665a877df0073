//! 도메인 모델.
//!
//! 인증/인가 서브시스템이 다루는 사용자, 역할, 권한 타입.

mod role;
mod user;

pub use role::{Permission, Role, RoleId, RoleSummary};
pub use user::{UserCredentials, UserId, UserProfile, UserRecord, UserStats};
