use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use crate::lib::auth::{AuthKeys, SessionUser, DEMO_USER_ID};
use crate::lib::constants::{REFRESH_COOKIE, REFRESH_TOKEN_TTL_DAYS};
use crate::lib::errors::{ApiError, AuthError};


#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub mode: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MsalBridgeRequest {
    pub sub: Option<String>,
    pub name: Option<String>,
}


fn refresh_cookie(value: String) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(CookieDuration::days(REFRESH_TOKEN_TTL_DAYS))
        .finish()
}

fn cleared_refresh_cookie() -> Cookie<'static> {
    let mut cookie = refresh_cookie(String::new());
    cookie.make_removal();
    cookie
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}


/// POST /v1/auth/login
///
/// Demo sign-in only. Answers with an access token and sets the refresh
/// cookie.
pub async fn login(
    keys: web::Data<AuthKeys>,
    body: web::Json<LoginRequest>,
) -> Result<impl Responder, ApiError> {
    let body = body.into_inner();
    if body.mode.as_deref() != Some("demo") {
        return Err(AuthError::DemoOnly.into());
    }
    keys.check_demo_credentials(
        body.email.as_deref().unwrap_or_default(),
        body.password.as_deref().unwrap_or_default(),
    )?;

    let access_token = keys.sign_access(DEMO_USER_ID, None)?;
    let refresh_token = keys.sign_refresh(DEMO_USER_ID)?;
    info!("Demo user signed in");
    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(refresh_token))
        .json(json!({
            "accessToken": access_token,
            "user": SessionUser::for_subject(DEMO_USER_ID, None),
        })))
}

/// POST /v1/auth/refresh
///
/// Issues a new access token from the refresh cookie. An invalid cookie is
/// cleared.
pub async fn refresh(keys: web::Data<AuthKeys>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let Some(cookie) = req.cookie(REFRESH_COOKIE) else {
        debug!("No refresh token in cookies");
        return Err(AuthError::MissingRefresh.into());
    };
    let claims = match keys.verify_refresh(cookie.value()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Rejected refresh token: {}", e);
            let err: ApiError = e.into();
            return Ok(HttpResponse::Unauthorized()
                .cookie(cleared_refresh_cookie())
                .json(json!({ "error": err.msg })));
        }
    };
    let access_token = keys.sign_access(&claims.sub, None)?;
    Ok(HttpResponse::Ok().json(json!({
        "accessToken": access_token,
        "user": SessionUser::from(&claims),
    })))
}

/// POST /v1/auth/msal-bridge
///
/// Mints a local access token for a Microsoft account the dashboard has
/// already signed in.
pub async fn msal_bridge(
    keys: web::Data<AuthKeys>,
    body: web::Json<MsalBridgeRequest>,
) -> Result<impl Responder, ApiError> {
    let body = body.into_inner();
    let sub = body
        .sub
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingSub)?;
    let user = SessionUser::for_subject(sub, body.name.as_deref().filter(|n| !n.trim().is_empty()));
    let access_token = keys.sign_access(&user.id, Some(&user.name))?;
    Ok(HttpResponse::Ok().json(json!({ "accessToken": access_token, "user": user })))
}

/// POST /v1/auth/logout
pub async fn logout() -> impl Responder {
    HttpResponse::Ok()
        .cookie(cleared_refresh_cookie())
        .json(json!({ "message": "Logged out successfully" }))
}

/// GET /v1/auth/me
pub async fn me(keys: web::Data<AuthKeys>, req: HttpRequest) -> Result<impl Responder, ApiError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;
    let claims = keys.verify_access(token)?;
    Ok(HttpResponse::Ok().json(json!({ "user": SessionUser::from(&claims) })))
}
