//! Invoice handlers

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{InvoiceId, ProjectId};
use domain_billing::InvoiceFilter;

use crate::auth::Claims;
use crate::dto::invoice::*;
use crate::dto::{ApiJson, ApiPath, ApiQuery};
use crate::{error::ApiError, AppState};

/// Creates an invoice and assigns its number
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<CreateInvoiceBody>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    body.validate()?;
    let view = state.service.create_invoice(&claims.sub, body.into()).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// Lists invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceSummary>>, ApiError> {
    let filter = InvoiceFilter::try_from(query)?;
    let views = state.service.list_invoices(&filter).await?;
    Ok(Json(views.into_iter().map(InvoiceSummary::from).collect()))
}

/// Gets an invoice by ID
pub async fn get_invoice(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let view = state.service.read_invoice(InvoiceId::from(id)).await?;
    Ok(Json(view.into()))
}

/// Applies a partial update
pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateInvoiceBody>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    body.validate()?;
    let view = state
        .service
        .update_invoice(&claims.sub, InvoiceId::from(id), body.into())
        .await?;
    Ok(Json(view.into()))
}

/// Soft-deletes an invoice
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.soft_delete(&claims.sub, InvoiceId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restores a soft-deleted invoice
pub async fn restore_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let view = state.service.restore(&claims.sub, InvoiceId::from(id)).await?;
    Ok(Json(view.into()))
}

/// Permanently removes an invoice; its number stays consumed
pub async fn purge_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let id = InvoiceId::from(id);
    state.service.hard_delete(id).await?;
    info!(invoice_id = %id, user = %claims.sub, "Invoice permanently deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let view = state.service.mark_paid(&claims.sub, InvoiceId::from(id)).await?;
    Ok(Json(view.into()))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let view = state.service.cancel(&claims.sub, InvoiceId::from(id)).await?;
    Ok(Json(view.into()))
}

/// Gets one of the calling client's invoices
pub async fn get_own_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let client_id = claims
        .client_id()
        .ok_or_else(|| ApiError::Forbidden("token does not name a client".to_string()))?;
    let view = state
        .service
        .read_own_invoice(client_id, InvoiceId::from(id))
        .await?;
    Ok(Json(view.into()))
}

/// Lists the invoices of one of the calling client's projects
pub async fn list_own_project_invoices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(project_id): ApiPath<Uuid>,
) -> Result<Json<Vec<InvoiceSummary>>, ApiError> {
    let client_id = claims
        .client_id()
        .ok_or_else(|| ApiError::Forbidden("token does not name a client".to_string()))?;
    let views = state
        .service
        .list_own_invoices(client_id, ProjectId::from(project_id))
        .await?;
    Ok(Json(views.into_iter().map(InvoiceSummary::from).collect()))
}
