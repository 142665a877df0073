//! 인증 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/auth/login` - 로그인, 토큰 쌍 발급
//! - `POST /api/v1/auth/logout` - 제시된 토큰 폐기
//! - `POST /api/v1/auth/refresh` - refresh token 교체
//! - `GET /api/v1/auth/me` - 현재 사용자 프로필 (인증 필요)
//! - `PUT /api/v1/auth/password` - 비밀번호 변경 (인증 필요)
//! - `GET /api/v1/auth/permissions/{name}` - 권한 확인 (인증 필요)
//!
//! 토큰은 HttpOnly 쿠키로 전달되며, 응답 본문에도 함께 포함됩니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use community_core::{auth_span, RoleId, UserCredentials, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::cookies::{clear_credentials, read_credentials, set_credentials};
use crate::auth::password::{
    hash_password_blocking, validate_password_strength, verify_password_blocking,
};
use crate::auth::{
    require_auth, ClientIp, CurrentUser, PasswordError, SessionCredentials,
    ACCESS_TOKEN_TTL_SECS,
};
use crate::error::{
    authentication_failed, internal_error, store_error, validation_error, ApiError,
    ApiErrorResponse, ApiResult,
};
use crate::metrics::record_auth_rejection;
use crate::state::AppState;

// ==================== 요청/응답 타입 ====================

/// 로그인 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// 비밀번호 변경 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// 발급된 토큰 쌍.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub access_token: String,
    pub refresh_token: String,
    /// access token 유효 시간(초)
    pub expires_in: i64,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(user_id: UserId, role_id: RoleId, access: String, refresh: String) -> Self {
        Self {
            user_id,
            role_id,
            access_token: access,
            refresh_token: refresh,
            expires_in: ACCESS_TOKEN_TTL_SECS,
            token_type: "Bearer".to_string(),
        }
    }
}

/// 권한 확인 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub role_id: RoleId,
    pub permission: String,
    pub granted: bool,
}

// ==================== 헬퍼 ====================

/// 새 토큰 쌍을 발급하고 쿠키에 설정합니다.
async fn issue_session(
    state: &AppState,
    jar: CookieJar,
    user_id: UserId,
    role_id: RoleId,
    ip: &str,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let access = state.codec.issue(user_id, role_id).map_err(|e| {
        error!(user_id, error = %e, "Failed to sign access token");
        internal_error()
    })?;
    let refresh = state.refresh.issue(user_id, ip).await?;

    let jar = set_credentials(jar, &access, &refresh, state.secure_cookies);
    Ok((
        jar,
        Json(TokenResponse::bearer(user_id, role_id, access, refresh)),
    ))
}

/// 제시된 토큰 쌍을 폐기합니다.
///
/// access token은 남은 수명 동안 폐기 목록에 두고, refresh token은 레코드를
/// 삭제합니다. 이미 만료되었거나 알 수 없는 토큰은 건너뜁니다.
async fn revoke_presented(
    state: &AppState,
    access: Option<&str>,
    refresh: Option<&str>,
) -> ApiResult<()> {
    let now = Utc::now();

    if let Some(access) = access {
        if let Some(remaining) = state.codec.remaining_lifetime(access, now) {
            state.ledger.add(access, remaining).await?;
        }
    }

    if let Some(refresh) = refresh {
        if let Some(record) = state.refresh.lookup(refresh).await? {
            state
                .ledger
                .add(refresh, record.remaining_lifetime(now))
                .await?;
        }
        state.refresh.revoke(refresh).await?;
    }

    Ok(())
}

fn password_failure(err: PasswordError) -> ApiError {
    match err {
        PasswordError::VerificationFailed | PasswordError::InvalidHashFormat => {
            authentication_failed()
        }
        PasswordError::HashingFailed | PasswordError::TaskFailed(_) => {
            error!(error = %err, "Password hashing task failed");
            internal_error()
        }
    }
}

// ==================== 핸들러 ====================

/// 로그인.
///
/// 사용자 이름이 없거나 비밀번호가 틀려도 같은 401 응답을 반환합니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = TokenResponse),
        (status = 400, description = "입력 검증 실패", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 503, description = "세션 저장소 장애", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    request.validate().map_err(validation_error)?;

    let span = auth_span!("login", ip);
    let credentials = verify_login(&state, request)
        .instrument(span.clone())
        .await?;
    span.record("user_id", credentials.id);

    let session = issue_session(&state, jar, credentials.id, credentials.role_id, &ip)
        .instrument(span.clone())
        .await?;
    span.in_scope(|| info!(user_id = credentials.id, "User logged in"));
    Ok(session)
}

/// 사용자 이름과 비밀번호를 확인합니다.
async fn verify_login(state: &AppState, request: LoginRequest) -> ApiResult<UserCredentials> {
    let credentials = state
        .store
        .find_credentials_by_username(&request.username)
        .await
        .map_err(store_error)?;

    let Some(credentials) = credentials else {
        record_auth_rejection("invalid_credentials");
        return Err(authentication_failed());
    };

    if let Err(e) =
        verify_password_blocking(request.password, credentials.password_hash.clone()).await
    {
        record_auth_rejection("invalid_credentials");
        return Err(password_failure(e));
    }

    Ok(credentials)
}

/// 로그아웃.
///
/// 인증을 요구하지 않습니다. 쿠키에 담긴 토큰을 폐기하고 쿠키를 지웁니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "로그아웃 완료"),
        (status = 503, description = "세션 저장소 장애", body = ApiErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, StatusCode)> {
    let (access, refresh) = read_credentials(&jar);
    revoke_presented(&state, access.as_deref(), refresh.as_deref()).await?;

    let jar = clear_credentials(jar, state.secure_cookies);
    Ok((jar, StatusCode::NO_CONTENT))
}

/// refresh token 교체.
///
/// 기존 refresh token은 소비되고 새 토큰 쌍이 발급됩니다. access token의
/// 역할은 저장소의 현재 역할을 따릅니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "교체 성공", body = TokenResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 503, description = "세션 저장소 장애", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> ApiResult<Response> {
    let (_, refresh) = read_credentials(&jar);
    let Some(refresh) = refresh else {
        record_auth_rejection("authentication_required");
        return Err(authentication_failed());
    };

    if state.ledger.contains(&refresh).await? {
        record_auth_rejection("revoked");
        return Err(authentication_failed());
    }

    let rotated = state.refresh.rotate(&refresh, &ip).await?;
    let user = match state.users.find(rotated.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user_id = rotated.user_id, "Refresh token owner no longer exists");
            record_auth_rejection("user_not_found");
            state.refresh.discard(&rotated.token).await;
            let jar = clear_credentials(jar, state.secure_cookies);
            return Ok((jar, authentication_failed()).into_response());
        }
        Err(e) => {
            state.refresh.discard(&rotated.token).await;
            return Err(store_error(e));
        }
    };

    let access = match state.codec.issue(user.id(), user.role_id()) {
        Ok(access) => access,
        Err(e) => {
            error!(user_id = user.id(), error = %e, "Failed to sign access token");
            state.refresh.discard(&rotated.token).await;
            return Err(internal_error());
        }
    };

    let jar = set_credentials(jar, &access, &rotated.token, state.secure_cookies);
    let body = TokenResponse::bearer(user.id(), user.role_id(), access, rotated.token);
    Ok((jar, Json(body)).into_response())
}

/// 현재 사용자 프로필.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "현재 사용자", body = UserProfile),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    state
        .users
        .find(ctx.user_id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(authentication_failed)
}

/// 비밀번호 변경.
///
/// 성공하면 현재 세션의 토큰을 폐기하고 새 토큰 쌍을 발급합니다.
#[utoipa::path(
    put,
    path = "/api/v1/auth/password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "변경 완료, 새 토큰 발급", body = TokenResponse),
        (status = 400, description = "입력 검증 실패", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Extension(session): Extension<SessionCredentials>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    request.validate().map_err(validation_error)?;
    validate_password_strength(&request.new_password).map_err(|reason| {
        validation_error(serde_json::json!({ "new_password": reason }))
    })?;

    let credentials = state
        .store
        .find_credentials_by_id(ctx.user_id)
        .await
        .map_err(store_error)?
        .ok_or_else(authentication_failed)?;

    verify_password_blocking(request.current_password, credentials.password_hash)
        .await
        .map_err(password_failure)?;

    let new_hash = hash_password_blocking(request.new_password)
        .await
        .map_err(password_failure)?;
    let updated = state
        .store
        .update_password_hash(ctx.user_id, &new_hash)
        .await
        .map_err(store_error)?;
    if !updated {
        return Err(authentication_failed());
    }

    if let Err(e) = state.users.invalidate(ctx.user_id).await {
        warn!(user_id = ctx.user_id, error = %e, "Failed to invalidate cached user");
    }

    revoke_presented(&state, Some(&session.access), session.refresh.as_deref()).await?;

    let session = issue_session(&state, jar, ctx.user_id, credentials.role_id, &ip).await?;
    info!(user_id = ctx.user_id, "Password changed");
    Ok(session)
}

/// 현재 사용자 역할의 권한 확인.
#[utoipa::path(
    get,
    path = "/api/v1/auth/permissions/{name}",
    tag = "auth",
    params(("name" = String, Path, description = "권한 이름")),
    responses(
        (status = 200, description = "판정 결과", body = PermissionCheckResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn check_permission(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Path(name): Path<String>,
) -> ApiResult<Json<PermissionCheckResponse>> {
    let granted = state
        .permissions
        .has_permission(ctx.role_id, &name)
        .await
        .map_err(store_error)?;

    Ok(Json(PermissionCheckResponse {
        role_id: ctx.role_id,
        permission: name,
        granted,
    }))
}

/// 인증 라우터 생성.
///
/// `/me`, `/password`, `/permissions/{name}`에는 [`require_auth`]가 적용됩니다.
pub fn auth_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/password", put(change_password))
        .route("/permissions/{name}", get(check_permission))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .merge(protected)
}
