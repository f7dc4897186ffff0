//! Account review and role assignment. ADMIN only; enforced in the service.

use std::str::FromStr;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use fl_core::{AppError, Role};
use serde::Deserialize;
use uuid::Uuid;

use super::respond;
use crate::error::ApiError;
use crate::extract::{verify_csrf, CurrentActor};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveForm {
    pub user_id: Uuid,
    /// "approve" or "reject"
    pub action: String,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleForm {
    pub user_id: Uuid,
    pub role: String,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

pub async fn approve_user(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    form: web::Form<ApproveForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let approve = match form.action.as_str() {
        "approve" => true,
        "reject" => false,
        other => return Err(AppError::invalid(format!("unknown action {other:?}")).into()),
    };
    let user = data
        .services
        .accounts
        .review_registration(&actor, form.user_id, approve)
        .await?;
    Ok(respond(form.redirect_to.as_deref(), StatusCode::OK, &user))
}

pub async fn change_role(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    form: web::Form<RoleForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let role = Role::from_str(&form.role)?;
    let user = data.services.accounts.change_role(&actor, form.user_id, role).await?;
    Ok(respond(form.redirect_to.as_deref(), StatusCode::OK, &user))
}
