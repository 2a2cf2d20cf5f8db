use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{Error, HttpResponse, ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{ClassifyResponse, ErrorResponse};

use super::model::{InferenceError, Model};

/// Multipart field that carries the uploaded image.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Missing multipart field 'file'")]
    MissingFile,
    #[error("{0}")]
    Inference(#[from] InferenceError),
    #[error("Inference worker failed: {0}")]
    Blocking(String),
}

impl ResponseError for ClassifyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifyError::Inference(InferenceError::Decode(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/classify/").route(web::post().to(classify_image)));
}

async fn classify_image(
    model: web::Data<Model>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(FILE_FIELD) || image_data.is_some() {
            continue;
        }
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }
        image_data = Some(data);
    }

    let image_data = image_data.ok_or_else(|| {
        warn!("Classification request without a '{}' field", FILE_FIELD);
        ClassifyError::MissingFile
    })?;
    let size = image_data.len();

    let model = model.into_inner();
    let label = web::block(move || model.classify(&image_data))
        .await
        .map_err(|e| ClassifyError::Blocking(e.to_string()))?
        .map_err(|e| {
            match &e {
                InferenceError::Decode(_) => warn!("Rejected upload of {} bytes: {}", size, e),
                _ => error!("Model inference error: {:?}", e),
            }
            ClassifyError::from(e)
        })?;

    info!("Classified upload of {} bytes as {}", size, label);
    Ok(HttpResponse::Ok().json(ClassifyResponse { class: label }))
}
