mod config;
mod feedback;
mod inference;
mod routes;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::{AppConfig, ModelDevice};
use feedback::repository::PgFeedbackRepository;
use inference::model::Model;
use routes::{configure_routes, cors};
use std::env;
use tch::Device;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let device = match config.model.device {
        ModelDevice::Cuda => Device::cuda_if_available(),
        ModelDevice::Cpu => Device::Cpu,
    };

    // Weights must be in place before any request is accepted.
    let model = match Model::load(&config.model.weights_path, device) {
        Ok(model) => web::Data::new(model),
        Err(e) => {
            log::error!("Failed to load model at startup: {}", e);
            return Err(std::io::Error::other(format!("Model loading failed: {}", e)));
        }
    };

    let feedback_repo = PgFeedbackRepository::connect_lazy(&config.database);

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors())
            .app_data(model.clone())
            .app_data(web::Data::new(feedback_repo.clone()))
            .configure(configure_routes::<PgFeedbackRepository>)
    })
    .bind(&bind_address)?
    .run()
    .await
}
