use crate::{config::AppConfig, db::DbPool};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub http: reqwest::Client,
    pub config: AppConfig,
}
