#[cfg(feature = "ssr")]
use actix_web::{web, HttpResponse};
#[cfg(feature = "ssr")]
use std::sync::Arc;
#[cfg(feature = "ssr")]
use leptos::logging::{error, log};

#[cfg(feature = "ssr")]
use crate::backend::RelationalStore;
#[cfg(feature = "ssr")]
use crate::reviews::{load_reviews, load_summary};

/// Shared state of the read-only review API.
#[cfg(feature = "ssr")]
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn RelationalStore + Send + Sync>,
    pub default_profile_pic: String,
}

/// `GET /api/reviews`: the enriched review list, newest first.
#[cfg(feature = "ssr")]
pub async fn get_reviews(state: web::Data<ApiState>) -> HttpResponse {
    log!("[SERVER] Received request for reviews");

    match load_reviews(state.store.as_ref(), &state.default_profile_pic).await {
        Ok(reviews) => {
            log!("[SERVER] Returning {} reviews", reviews.len());
            HttpResponse::Ok().json(reviews)
        }
        Err(err) => {
            error!("[SERVER] Failed to load reviews: {}", err);
            HttpResponse::BadGateway().body("Failed to load reviews")
        }
    }
}

/// `GET /api/summary`: player count, rating count and average.
#[cfg(feature = "ssr")]
pub async fn get_summary(state: web::Data<ApiState>) -> HttpResponse {
    match load_summary(state.store.as_ref()).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(err) => {
            error!("[SERVER] Failed to load summary: {}", err);
            HttpResponse::BadGateway().body("Failed to load summary")
        }
    }
}

/// Registers the API routes under `/api`.
#[cfg(feature = "ssr")]
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/reviews", web::get().to(get_reviews))
            .route("/summary", web::get().to(get_summary)),
    );
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;
    use crate::db::Database;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    async fn state() -> ApiState {
        let db = Database::new(":memory:").unwrap();
        db.create_schema().await.unwrap();
        db.insert(
            crate::backend::Table::Reviews,
            json!({"username": "regi", "rating": 4, "comment": "Jó"}),
        )
        .await
        .unwrap();
        ApiState {
            store: Arc::new(db),
            default_profile_pic: "default.png".into(),
        }
    }

    #[actix_web::test]
    async fn reviews_endpoint_returns_enriched_rows() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/reviews").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body[0]["username"], "regi");
        assert_eq!(body[0]["profile_pic"], "default.png");
        assert_eq!(body[0]["confirmation"], "Confirmed");
    }

    #[actix_web::test]
    async fn summary_endpoint_reports_the_average() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/summary").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["ratings"], 1);
        assert_eq!(body["players"], 0);
        assert_eq!(body["average"], json!({"Average": 4.0}));
    }
}
