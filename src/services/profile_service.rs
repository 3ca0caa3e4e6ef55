//! OAuth profile enrichment.
//!
//! After a provider authenticates a user, the access token buys one call to
//! the provider's profile API. Whatever comes back (gender, about text,
//! birthdate, avatar) is copied onto the account; an underage birthdate
//! deletes the account and refuses the registration. Provider or image
//! failures are never fatal — the account just stays unenriched.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    response: Vec<ProviderProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderProfile {
    #[serde(default)]
    sex: Option<i64>,
    #[serde(default)]
    about: Option<String>,
    #[serde(default)]
    bdate: Option<String>,
    #[serde(default)]
    photo_max_orig: Option<String>,
}

pub async fn enrich_profile(
    state: &AppState,
    user_id: Uuid,
    access_token: &str,
) -> AppResult<()> {
    let profile = match fetch_profile(state, access_token).await {
        Ok(Some(p)) => p,
        Ok(None) => return Ok(()),
        Err(err) => {
            tracing::warn!(error = %err, %user_id, "profile fetch failed, skipping enrichment");
            return Ok(());
        }
    };

    let gender = profile
        .sex
        .filter(|s| *s != 0)
        .map(|s| gender_from_sex(s).to_string());
    let about_me = profile.about.filter(|a| !a.is_empty());

    let mut age: Option<i32> = None;
    if let Some(bdate) = profile.bdate.as_deref().filter(|b| !b.is_empty()) {
        match NaiveDate::parse_from_str(bdate, "%d.%m.%Y") {
            Ok(birth) => {
                let years = age_in_years(birth, Utc::now().date_naive());
                if years < 18 {
                    sqlx::query("DELETE FROM users WHERE id = $1")
                        .bind(user_id)
                        .execute(&state.pool)
                        .await?;
                    return Err(AppError::AuthForbidden);
                }
                age = Some(years);
            }
            Err(err) => {
                tracing::warn!(error = %err, %user_id, "unparseable birthdate, skipping age");
            }
        }
    }

    let avatar = match profile.photo_max_orig.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => match store_avatar(state, user_id, url).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, %user_id, "avatar download failed, skipping");
                None
            }
        },
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE users
        SET gender = COALESCE($2, gender),
            about_me = COALESCE($3, about_me),
            age = COALESCE($4, age),
            avatar = COALESCE($5, avatar)
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(gender)
    .bind(about_me)
    .bind(age)
    .bind(avatar)
    .execute(&state.pool)
    .await?;

    Ok(())
}

fn gender_from_sex(sex: i64) -> &'static str {
    if sex == 2 { "male" } else { "female" }
}

/// The provider reports birthdates only; age is the whole-calendar-year
/// difference.
fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - birth.year()
}

async fn fetch_profile(
    state: &AppState,
    access_token: &str,
) -> anyhow::Result<Option<ProviderProfile>> {
    let resp = state
        .http
        .get(&state.config.oauth_profile_api)
        .query(&[
            ("fields", "sex,about,bdate,photo_max_orig"),
            ("v", "5.131"),
            ("access_token", access_token),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        return Ok(None);
    }

    let mut envelope: ProfileEnvelope = resp.json().await?;
    if envelope.response.is_empty() {
        return Ok(None);
    }
    Ok(Some(envelope.response.remove(0)))
}

async fn store_avatar(state: &AppState, user_id: Uuid, url: &str) -> anyhow::Result<String> {
    let resp = state.http.get(url).send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;

    let relative = format!("users_avatars/{user_id}.jpg");
    let media_root = std::path::Path::new(&state.config.media_root);
    tokio::fs::create_dir_all(media_root.join("users_avatars")).await?;
    tokio::fs::write(media_root.join(&relative), &bytes).await?;

    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_codes_map_to_gender() {
        assert_eq!(gender_from_sex(2), "male");
        assert_eq!(gender_from_sex(1), "female");
    }

    #[test]
    fn age_is_year_difference() {
        let birth = NaiveDate::from_ymd_opt(2000, 12, 31).unwrap();
        let today = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        assert_eq!(age_in_years(birth, today), 18);
    }

    #[test]
    fn provider_payload_deserializes_with_missing_fields() {
        let body = r#"{"response":[{"sex":2,"bdate":"01.02.1990"}]}"#;
        let envelope: ProfileEnvelope = serde_json::from_str(body).unwrap();
        let profile = &envelope.response[0];
        assert_eq!(profile.sex, Some(2));
        assert_eq!(profile.bdate.as_deref(), Some("01.02.1990"));
        assert!(profile.about.is_none());
        assert!(profile.photo_max_orig.is_none());
    }

    #[test]
    fn empty_response_list_is_none_shaped() {
        let body = r#"{"response":[]}"#;
        let envelope: ProfileEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.response.is_empty());
    }
}
