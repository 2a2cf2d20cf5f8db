use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use log::{error, info};
use shared::{ErrorResponse, FeedbackCreate, MessageResponse};

use super::repository::{FeedbackStore, RepositoryError};

pub const FEEDBACK_CREATED: &str = "Feedback enviado com sucesso!";

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Erro ao inserir feedback: {0}")]
    Insert(RepositoryError),
    #[error("Erro ao buscar feedbacks: {0}")]
    Fetch(RepositoryError),
}

impl ResponseError for FeedbackError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

pub fn configure<S>(cfg: &mut web::ServiceConfig)
where
    S: FeedbackStore + 'static,
{
    cfg.service(
        web::resource("/feedbacks/")
            .route(web::post().to(create_feedback::<S>))
            .route(web::get().to(list_feedbacks::<S>)),
    );
}

async fn create_feedback<S: FeedbackStore>(
    store: web::Data<S>,
    payload: web::Json<FeedbackCreate>,
) -> Result<HttpResponse, FeedbackError> {
    let feedback = payload.into_inner();
    store.create_feedback(&feedback).await.map_err(|e| {
        error!("Failed to store feedback from {}: {}", feedback.user_name, e);
        FeedbackError::Insert(e)
    })?;

    info!(
        "Stored feedback from {} (rating {}, class {})",
        feedback.user_name, feedback.rating, feedback.class_predicted
    );
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: FEEDBACK_CREATED.to_string(),
    }))
}

async fn list_feedbacks<S: FeedbackStore>(
    store: web::Data<S>,
) -> Result<HttpResponse, FeedbackError> {
    let feedbacks = store.list_feedbacks().await.map_err(|e| {
        error!("Failed to fetch feedbacks: {}", e);
        FeedbackError::Fetch(e)
    })?;
    Ok(HttpResponse::Ok().json(feedbacks))
}
