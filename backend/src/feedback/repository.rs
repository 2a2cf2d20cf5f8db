use std::future::Future;

use log::{debug, error, info, warn};
use shared::FeedbackCreate;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::Feedback;
use crate::config::DatabaseConfig;

const INSERT_FEEDBACK: &str = r#"
    INSERT INTO feedbacks (user_name, rating, comment, class_predicted, created_at)
    VALUES ($1, $2, $3, $4, CURRENT_DATE)
"#;

const SELECT_FEEDBACKS: &str = r#"
    SELECT user_name, rating, comment, class_predicted, created_at
    FROM feedbacks
    ORDER BY created_at DESC
"#;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

/// Access to persisted feedback.
pub trait FeedbackStore {
    /// Stores one record dated with the server's current day.
    fn create_feedback(
        &self,
        feedback: &FeedbackCreate,
    ) -> impl Future<Output = Result<(), RepositoryError>>;

    /// Every stored record, newest `created_at` first.
    fn list_feedbacks(&self) -> impl Future<Output = Result<Vec<Feedback>, RepositoryError>>;
}

#[derive(Clone)]
pub struct PgFeedbackRepository {
    pool: PgPool,
}

impl PgFeedbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool that opens connections on first use, so the service can
    /// start while the database is still unreachable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        info!(
            "Using feedback database {}@{}:{}/{} (max {} connections)",
            config.user, config.host, config.port, config.name, config.max_connections
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(config.connect_options());
        Self::new(pool)
    }
}

impl FeedbackStore for PgFeedbackRepository {
    async fn create_feedback(&self, feedback: &FeedbackCreate) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(INSERT_FEEDBACK)
            .bind(&feedback.user_name)
            .bind(feedback.rating)
            .bind(&feedback.comment)
            .bind(&feedback.class_predicted)
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                debug!("Stored feedback from {}", feedback.user_name);
                Ok(())
            }
            Err(e) => {
                error!("Insert into feedbacks failed: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback after failed insert also failed: {}", rollback);
                }
                Err(e.into())
            }
        }
    }

    async fn list_feedbacks(&self) -> Result<Vec<Feedback>, RepositoryError> {
        let rows = sqlx::query_as::<_, Feedback>(SELECT_FEEDBACKS)
            .fetch_all(&self.pool)
            .await?;
        debug!("Fetched {} feedback rows", rows.len());
        Ok(rows)
    }
}
