use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Base URL of the OAuth provider's profile API (`users.get`-style).
    pub oauth_profile_api: String,
    /// Directory that receives avatar images under `users_avatars/`.
    pub media_root: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let oauth_profile_api = env::var("OAUTH_PROFILE_API")
            .unwrap_or_else(|_| "https://api.vk.com/method/users.get".to_string());
        let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string());
        Ok(Self {
            database_url,
            host,
            port,
            oauth_profile_api,
            media_root,
        })
    }
}
