use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use super::error::ApiError;
use crate::metrics::Metrics;
use crate::service::OrderService;

pub async fn get_order(
    service: web::Data<Arc<OrderService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let order_uid = path.into_inner();
    if order_uid.trim().is_empty() {
        return Err(ApiError::MissingOrderUid);
    }

    let order = service.get_order(&order_uid).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn health(service: web::Data<Arc<OrderService>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-store",
        "cached_orders": service.cache().len()
    }))
}

pub async fn metrics(metrics: web::Data<Arc<Metrics>>) -> HttpResponse {
    match metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
