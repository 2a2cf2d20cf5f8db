use actix_cors::Cors;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use log::warn;
use shared::ErrorResponse;

use crate::feedback;
use crate::feedback::repository::FeedbackStore;
use crate::inference;

/// Registers the classification and feedback route groups.
pub fn configure_routes<S>(cfg: &mut web::ServiceConfig)
where
    S: FeedbackStore + 'static,
{
    cfg.app_data(json_config())
        .configure(inference::routes::configure)
        .configure(feedback::routes::configure::<S>);
}

/// JSON extractor settings: schema failures answer 422 with a `detail` body.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        let status = match &err {
            JsonPayloadError::Deserialize(_) => StatusCode::UNPROCESSABLE_ENTITY,
            other => other.status_code(),
        };
        warn!("Rejected JSON body for {}: {}", req.path(), err);
        let response = HttpResponse::build(status).json(ErrorResponse {
            detail: err.to_string(),
        });
        InternalError::from_response(err, response).into()
    })
}

/// Any origin, method and header, with credentials. Development use only.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::repository::memory::MemoryFeedbackStore;
    use crate::inference::model::seeded_model;
    use actix_web::http::header;
    use actix_web::{App, test};
    use chrono::NaiveDate;

    #[actix_web::test]
    async fn test_both_route_groups_are_mounted() {
        let app = test::init_service(
            App::new()
                .wrap(cors())
                .app_data(web::Data::new(seeded_model(2)))
                .app_data(web::Data::new(MemoryFeedbackStore::new(
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                )))
                .configure(configure_routes::<MemoryFeedbackStore>),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/feedbacks/").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // GET is not routed for classification
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/classify/").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_web::test]
    async fn test_cors_preflight_allows_any_origin_with_credentials() {
        let app = test::init_service(
            App::new()
                .wrap(cors())
                .app_data(web::Data::new(MemoryFeedbackStore::new(
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                )))
                .configure(feedback::routes::configure::<MemoryFeedbackStore>),
        )
        .await;

        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/feedbacks/")
            .insert_header((header::ORIGIN, "http://frontend.example"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "x-custom-header"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let headers = resp.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://frontend.example"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }
}
