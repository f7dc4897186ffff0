//! Comment listing, posting, moderation and attachment download.

use std::str::FromStr;

use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use fl_core::{AppError, CommentStatus, ResourceRef, ResourceType};
use fl_services::NewComment;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::respond;
use crate::error::ApiError;
use crate::extract::{verify_csrf, CurrentActor};
use crate::multipart::read_form;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub resource_type: String,
    pub resource_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateForm {
    pub comment_id: Uuid,
    /// "edit", "status", "pin" or "lock"
    pub action: String,
    pub content: Option<String>,
    pub status: Option<String>,
    pub locked: Option<String>,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteForm {
    pub comment_id: Uuid,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

fn resource_of(tag: Option<&str>, id: Option<&str>) -> Result<ResourceRef, AppError> {
    let kind = ResourceType::parse_tag(tag.unwrap_or_default())?;
    let id = id
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::invalid("invalid resource"))?;
    Ok(ResourceRef { kind, id })
}

/// `GET /api/comments?resourceType=FARM_DATA&resourceId=<uuid>`
pub async fn list(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    query: web::Query<ResourceQuery>,
) -> Result<HttpResponse, ApiError> {
    let resource = ResourceRef {
        kind: ResourceType::parse_tag(&query.resource_type)?,
        id: query.resource_id,
    };
    let view = data.services.comments.visible_comments(&actor, resource).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// `multipart/form-data`: content, resourceType, resourceId, optional
/// parentId, issueTags and an `attachment` part.
pub async fn create(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_form(payload, "attachment", data.max_upload_bytes).await?;
    verify_csrf(&req, &data, form.text("csrf"))?;

    let resource = resource_of(form.text("resourceType"), form.text("resourceId"))?;
    let mut input = NewComment::new(resource, form.text("content").unwrap_or_default());
    if let Some(raw) = form.text("parentId") {
        let parent = Uuid::parse_str(raw).map_err(|_| AppError::invalid("invalid parent"))?;
        input = input.reply_to(parent);
    }
    if let Some(tags) = form.text("issueTags").or_else(|| form.text("issueTag")) {
        input = input.with_tags(tags);
    }
    if let Some(file) = &form.file {
        let content_type = file.content_type.as_deref().unwrap_or("application/octet-stream");
        input = input.with_attachment(content_type, file.data.clone());
    }

    let comment = data.services.comments.create_comment(&actor, input).await?;
    Ok(respond(form.text("redirectTo"), StatusCode::CREATED, &comment))
}

pub async fn update(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    form: web::Form<UpdateForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let redirect_to = form.redirect_to.as_deref();

    let response = match form.action.as_str() {
        "edit" => {
            let content = form.content.as_deref().unwrap_or_default();
            let comment = data.services.comments.edit_comment(&actor, form.comment_id, content).await?;
            respond(redirect_to, StatusCode::OK, &comment)
        }
        "status" => {
            let status = CommentStatus::from_str(form.status.as_deref().unwrap_or_default())?;
            let comment = data.services.moderation.set_status(&actor, form.comment_id, status).await?;
            respond(redirect_to, StatusCode::OK, &comment)
        }
        "pin" => {
            let state = data.services.moderation.toggle_pin(&actor, form.comment_id).await?;
            respond(redirect_to, StatusCode::OK, &json!({ "pin": state }))
        }
        "lock" => {
            let locked = form.locked.as_deref() == Some("true");
            let thread = data
                .services
                .moderation
                .set_lock_for_comment(&actor, form.comment_id, locked)
                .await?;
            respond(redirect_to, StatusCode::OK, &thread)
        }
        other => return Err(AppError::invalid(format!("invalid action {other:?}")).into()),
    };
    Ok(response)
}

pub async fn delete(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    form: web::Form<DeleteForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let removed = data.services.comments.delete_comment(&actor, form.comment_id).await?;
    Ok(respond(form.redirect_to.as_deref(), StatusCode::OK, &json!({ "removed": removed })))
}

pub async fn attachment(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let (bytes, mime) = data.services.comments.attachment(&actor, path.into_inner()).await?;
    let mime = if mime.is_empty() { "application/octet-stream".to_string() } else { mime };
    Ok(HttpResponse::Ok().content_type(mime).body(bytes))
}

pub async fn landing(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<HttpResponse, ApiError> {
    let view = data.services.comments.landing_thread(&actor).await?;
    Ok(HttpResponse::Ok().json(view))
}
