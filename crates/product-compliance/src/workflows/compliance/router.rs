use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ChecklistLineId, ComplianceTypeId, ProductId};
use super::recompute::PeriodicReevaluator;
use super::repository::{ComplianceTypeRepository, ProductRepository, RepositoryError};
use super::service::{
    ComplianceServiceError, ComplianceTypeUpdate, DateUpdate, LineDraft, LineUpdate,
    ProductComplianceService, ProductDraft,
};

/// Shared handler state: the service plus the sweep it backs.
pub struct ComplianceState<P, T> {
    pub service: Arc<ProductComplianceService<P, T>>,
    pub reevaluator: PeriodicReevaluator<P, T>,
}

impl<P, T> Clone for ComplianceState<P, T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            reevaluator: self.reevaluator.clone(),
        }
    }
}

impl<P, T> ComplianceState<P, T>
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    pub fn new(service: Arc<ProductComplianceService<P, T>>) -> Self {
        let reevaluator = PeriodicReevaluator::new(Arc::clone(&service));
        Self {
            service,
            reevaluator,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NewComplianceType {
    pub(crate) name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NotificationSettings {
    #[serde(default)]
    pub(crate) notification_emails: Option<String>,
}

/// Router builder exposing product checklist, category and settings endpoints.
pub fn compliance_router<P, T>(service: Arc<ProductComplianceService<P, T>>) -> Router
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/compliance/products",
            post(create_product_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id",
            get(product_handler::<P, T>).delete(delete_product_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id/dates",
            put(dates_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id/duplicate",
            post(duplicate_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id/recompute",
            post(recompute_product_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id/lines",
            post(add_line_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/products/:product_id/lines/:line_id",
            put(update_line_handler::<P, T>).delete(remove_line_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/types",
            get(list_types_handler::<P, T>).post(create_type_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/types/:type_id",
            put(update_type_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/settings",
            get(settings_handler::<P, T>).put(update_settings_handler::<P, T>),
        )
        .route(
            "/api/v1/compliance/recompute",
            post(recompute_all_handler::<P, T>),
        )
        .with_state(ComplianceState::new(service))
}

pub(crate) async fn create_product_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Json(draft): Json<ProductDraft>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.create_product(draft) {
        Ok(update) => (StatusCode::CREATED, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn product_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.get(&ProductId(product_id)) {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_product_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.delete_product(&ProductId(product_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dates_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
    Json(dates): Json<DateUpdate>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.set_dates(&ProductId(product_id), dates) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn duplicate_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.duplicate_product(&ProductId(product_id)) {
        Ok(update) => (StatusCode::CREATED, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recompute_product_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.recompute(&ProductId(product_id)) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn add_line_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(product_id): Path<String>,
    Json(draft): Json<LineDraft>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.add_line(&ProductId(product_id), draft) {
        Ok(update) => (StatusCode::CREATED, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_line_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path((product_id, line_id)): Path<(String, String)>,
    Json(update): Json<LineUpdate>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.update_line(
        &ProductId(product_id),
        &ChecklistLineId(line_id),
        update,
    ) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn remove_line_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path((product_id, line_id)): Path<(String, String)>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state
        .service
        .remove_line(&ProductId(product_id), &ChecklistLineId(line_id))
    {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_types_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.compliance_types(true) {
        Ok(types) => (StatusCode::OK, Json(types)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_type_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Json(payload): Json<NewComplianceType>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.service.create_compliance_type(&payload.name) {
        Ok(compliance_type) => (StatusCode::CREATED, Json(compliance_type)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_type_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Path(type_id): Path<String>,
    Json(update): Json<ComplianceTypeUpdate>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state
        .service
        .update_compliance_type(&ComplianceTypeId(type_id), update)
    {
        Ok(compliance_type) => (StatusCode::OK, Json(compliance_type)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn settings_handler<P, T>(State(state): State<ComplianceState<P, T>>) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    let settings = NotificationSettings {
        notification_emails: state.service.notification_emails(),
    };
    (StatusCode::OK, Json(settings)).into_response()
}

pub(crate) async fn update_settings_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
    Json(payload): Json<NotificationSettings>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state
        .service
        .set_notification_emails(payload.notification_emails)
    {
        Ok(()) => {
            let settings = NotificationSettings {
                notification_emails: state.service.notification_emails(),
            };
            (StatusCode::OK, Json(settings)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recompute_all_handler<P, T>(
    State(state): State<ComplianceState<P, T>>,
) -> Response
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    match state.reevaluator.run() {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

/// HTTP status for a service error, shared with `AppError`.
pub(crate) fn status_for(err: &ComplianceServiceError) -> StatusCode {
    match err {
        ComplianceServiceError::Repository(RepositoryError::NotFound)
        | ComplianceServiceError::UnknownLine(_)
        | ComplianceServiceError::UnknownComplianceType(_) => StatusCode::NOT_FOUND,
        ComplianceServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ComplianceServiceError::InactiveComplianceType(_)
        | ComplianceServiceError::InvalidComplianceTypeName => StatusCode::UNPROCESSABLE_ENTITY,
        ComplianceServiceError::Repository(RepositoryError::Unavailable(_))
        | ComplianceServiceError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ComplianceServiceError) -> Response {
    let payload = json!({ "error": err.to_string() });
    (status_for(&err), Json(payload)).into_response()
}
