use axum::{
    body::Bytes,
    extract::{Query, State},
    http::Uri,
    Json,
};
use schemars::schema_for;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, ApiState, API_VERSION};
use crate::config::{profile::sanitize_name, Config};

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    /// Present when the caller wants to wait for the next change
    pub poll: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub profile: Option<String>,
}

impl ProfileQuery {
    fn name(&self) -> Result<String, ApiError> {
        let name = self
            .profile
            .as_deref()
            .map(sanitize_name)
            .unwrap_or_default();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Profile not specified".into()));
        }
        Ok(name)
    }
}

fn parse_object(body: &[u8]) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ApiError::BadRequest(format!(
            "Parsing the POST content as json failed with the following error:\n{e}"
        ))
    })?;
    if !value.is_object() {
        return Err(ApiError::BadRequest(
            "Content should be a dictionary.".into(),
        ));
    }
    Ok(value)
}

pub async fn version() -> Json<Value> {
    Json(json!({ "version": API_VERSION }))
}

/// Schema of the settings tree. Translations are not provided, `lang` is
/// accepted and ignored.
pub async fn settings(Query(_query): Query<StateQuery>) -> Result<Json<Value>, ApiError> {
    let schema = schema_for!(Config);
    let value = serde_json::to_value(schema).map_err(crate::config::LoadError::from)?;
    Ok(Json(value))
}

pub async fn get_state(
    State(api): State<ApiState>,
    Query(query): Query<StateQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.poll.is_some() {
        let mut rx = api.state.subscribe();
        rx.mark_unchanged();
        // Sender lives as long as the state, an error means shutdown
        let _ = rx.changed().await;
    }
    Ok(Json(api.state.value()?))
}

pub async fn post_state(State(api): State<ApiState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let delta = parse_object(&body)?;
    log::debug!("Merging state from API: {delta}");
    let config = api.state.merge(&delta)?;
    Ok(Json(config.to_value()?))
}

/// Section layout of the settings tree
pub async fn sections() -> Json<Value> {
    Json(json!({
        "controllers": {
            "controller": "Controller",
        },
        "tdp": {
            "tdp": "TDP",
            "fan": "Fan",
            "battery": "Battery",
            "power": "Power",
        },
        "hhd": {
            "http": "API",
        },
    }))
}

pub async fn list_profiles(State(api): State<ApiState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(api.profiles.list()?))
}

pub async fn get_profile(
    State(api): State<ApiState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<Value>, ApiError> {
    let name = query.name()?;
    match api.profiles.get(&name)? {
        Some(profile) => Ok(Json(profile)),
        None => Err(ApiError::BadRequest(format!("Profile '{name}' not found."))),
    }
}

pub async fn set_profile(
    State(api): State<ApiState>,
    Query(query): Query<ProfileQuery>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let name = query.name()?;
    let config = parse_object(&body)?;
    api.profiles.set(&name, &config)?;
    Ok(Json(config))
}

pub async fn delete_profile(
    State(api): State<ApiState>,
    Query(query): Query<ProfileQuery>,
) -> Result<(), ApiError> {
    let name = query.name()?;
    if !api.profiles.delete(&name)? {
        return Err(ApiError::BadRequest(format!("Profile '{name}' not found.")));
    }
    Ok(())
}

/// Merge a profile into the live state, returning the new state
pub async fn apply_profile(
    State(api): State<ApiState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<Value>, ApiError> {
    let name = query.name()?;
    let Some(profile) = api.profiles.get(&name)? else {
        return Err(ApiError::BadRequest(format!("Profile '{name}' not found.")));
    };
    log::info!("Applying profile '{name}'");
    let config = api.state.merge(&profile)?;
    Ok(Json(config.to_value()?))
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Command '{}' not supported.", uri.path()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{profile::ProfileStore, state::State as LiveState, Emulation};

    fn api(dir: &std::path::Path) -> ApiState {
        ApiState::new(
            LiveState::new(Config::default()),
            ProfileStore::new(dir.join("profiles")),
            None,
        )
    }

    #[tokio::test]
    async fn state_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let api = api(dir.path());

        let Json(value) = post_state(
            State(api.clone()),
            Bytes::from_static(br#"{"controller": {"emulation": "xbox"}}"#),
        )
        .await
        .unwrap();
        assert_eq!(value["controller"]["emulation"], "xbox");
        assert_eq!(api.state.config().controller.emulation, Emulation::Xbox);

        let err = post_state(State(api.clone()), Bytes::from_static(b"[1, 2]")).await;
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
        let err = post_state(
            State(api),
            Bytes::from_static(br#"{"controller": {"emulation": "n64"}}"#),
        )
        .await;
        assert!(matches!(err, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn poll_waits_for_change() {
        let dir = tempfile::tempdir().unwrap();
        let api = api(dir.path());

        let poll = tokio::spawn(get_state(
            State(api.clone()),
            Query(StateQuery {
                poll: Some(String::new()),
                lang: None,
            }),
        ));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!poll.is_finished());

        api.state
            .merge(&json!({"tdp": {"mode": "quiet"}}))
            .unwrap();
        let Json(value) = poll.await.unwrap().unwrap();
        assert_eq!(value["tdp"]["mode"], "quiet");
    }

    #[tokio::test]
    async fn profile_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let api = api(dir.path());
        let query = |name: &str| {
            Query(ProfileQuery {
                profile: Some(name.to_string()),
            })
        };

        set_profile(
            State(api.clone()),
            query("Quiet Mode!"),
            Bytes::from_static(br#"{"tdp": {"mode": "quiet"}}"#),
        )
        .await
        .unwrap();
        let Json(list) = list_profiles(State(api.clone())).await.unwrap();
        assert_eq!(list, vec!["Quiet Mode"]);

        let Json(state) = apply_profile(State(api.clone()), query("Quiet Mode"))
            .await
            .unwrap();
        assert_eq!(state["tdp"]["mode"], "quiet");

        delete_profile(State(api.clone()), query("Quiet Mode"))
            .await
            .unwrap();
        assert!(get_profile(State(api.clone()), query("Quiet Mode")).await.is_err());
        assert!(matches!(
            get_profile(State(api), Query(ProfileQuery::default())).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn settings_schema() {
        let Json(schema) = settings(Query(StateQuery::default())).await.unwrap();
        assert!(schema["properties"]["controller"].is_object());
        let Json(version) = version().await;
        assert_eq!(version["version"], 5);
    }
}
