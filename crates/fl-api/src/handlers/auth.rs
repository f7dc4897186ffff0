//! Registration, captcha, login and logout.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use fl_core::AppError;
use fl_services::LoginRequest;
use serde::Deserialize;
use serde_json::json;

use super::respond;
use crate::error::ApiError;
use crate::extract::{expired_cookie, http_only_cookie, verify_csrf, CAPTCHA_COOKIE, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub captcha: String,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutForm {
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

pub async fn register(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let user = data.services.accounts.register(&form.email, &form.password).await?;
    Ok(respond(form.redirect_to.as_deref(), StatusCode::CREATED, &user))
}

/// Issues a fresh arithmetic challenge; the signed answer rides in a cookie.
pub async fn captcha(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let captcha = data.auth.create_captcha();
    Ok(HttpResponse::Ok()
        .cookie(http_only_cookie(CAPTCHA_COOKIE, captcha.token, data.secure_cookies))
        .json(json!({ "question": captcha.question })))
}

/// A captcha is good for one attempt: its cookie is cleared on every outcome.
pub async fn login(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let captcha_token = req.cookie(CAPTCHA_COOKIE).map(|c| c.value().to_string()).unwrap_or_default();
    let clear_captcha = expired_cookie(CAPTCHA_COOKIE, data.secure_cookies);

    let outcome = data
        .services
        .accounts
        .login(LoginRequest {
            email: &form.email,
            password: &form.password,
            captcha_answer: &form.captcha,
            captcha_token: &captcha_token,
        })
        .await;

    let mut response = match outcome {
        Ok((user, token)) => {
            let mut response = respond(form.redirect_to.as_deref(), StatusCode::OK, &user);
            response
                .add_cookie(&http_only_cookie(SESSION_COOKIE, token, data.secure_cookies))
                .map_err(|e| AppError::Internal(e.to_string()))?;
            response
        }
        Err(err) => ApiError(err).error_response(),
    };
    response
        .add_cookie(&clear_captcha)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}

pub async fn logout(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<LogoutForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let mut response = respond(form.redirect_to.as_deref(), StatusCode::OK, &json!({ "loggedOut": true }));
    response
        .add_cookie(&expired_cookie(SESSION_COOKIE, data.secure_cookies))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}
