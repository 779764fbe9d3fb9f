/// Hosted auth + REST database store
///
/// Auth goes through the `/auth/v1` endpoints; the `movies` and `users` tables
/// are reached through `/rest/v1` with `eq.` column filters. Every request
/// carries the public API key, and table requests additionally carry the
/// signed-in user's bearer token so row-level security applies.
///
/// With a session file configured the current session survives restarts.
/// Access tokens are refreshed shortly before they expire, or when a table
/// request is rejected; a refused refresh signs the user out.
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    db::RemoteStore,
    error::{AppError, AppResult},
    models::{CollectionItem, CollectionQuery, ItemUpdate, NewCollectionItem, Profile, Session},
};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

const COLLECTION_TABLE: &str = "movies";
const PROFILE_TABLE: &str = "users";

/// Refresh this long before the access token expires
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshCredentials<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Token grant; sign-up returns the same shape when no confirmation is required
#[derive(Debug, Deserialize)]
struct ApiSessionResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<ApiUser>,
}

/// Auth errors come in two generations of shape
#[derive(Debug, Default, Deserialize)]
struct ApiAuthError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiAuthError {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Reads a saved session; a missing or unreadable file means none
fn load_session(path: &Path) -> Option<Session> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Failed to read saved session");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Ignoring corrupt session file");
            None
        }
    }
}

/// Writes the session, or removes the file when there is none
fn save_session(path: &Path, session: Option<&Session>) -> AppResult<()> {
    let Some(session) = session else {
        return match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(AppError::Internal(e.to_string())),
            _ => Ok(()),
        };
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| AppError::Internal(e.to_string()))?;
    }
    let body =
        serde_json::to_vec_pretty(session).map_err(|e| AppError::Internal(e.to_string()))?;
    std::fs::write(path, body).map_err(|e| AppError::Internal(e.to_string()))
}

pub struct RestStore {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    session_file: Option<PathBuf>,
    /// Current session; also the source for `auth_subscribe`
    session_tx: watch::Sender<Option<Session>>,
}

impl RestStore {
    pub fn new(api_url: String, api_key: String) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            session_file: None,
            session_tx,
        }
    }

    /// Keeps the session in `path`, starting from whatever was saved there
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(session) = load_session(&path) {
            tracing::debug!(user_id = %session.user_id, "Loaded saved session");
            self.session_tx.send_replace(Some(session));
        }
        self.session_file = Some(path);
        self
    }

    fn current(&self) -> Option<Session> {
        self.session_tx.borrow().clone()
    }

    fn access_token(&self) -> Option<String> {
        self.session_tx
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    fn publish(&self, session: Option<Session>) {
        if let Some(path) = &self.session_file {
            if let Err(e) = save_session(path, session.as_ref()) {
                tracing::warn!(error = %e, path = %path.display(), "Failed to save session");
            }
        }
        self.session_tx.send_replace(session);
    }

    fn auth_request(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.header("apikey", &self.api_key).bearer_auth(token)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn session_from_response(&self, body: ApiSessionResponse) -> AppResult<Session> {
        let access_token = body.access_token.ok_or_else(|| {
            AppError::Auth("Email confirmation required before signing in".to_string())
        })?;
        let user = body
            .user
            .ok_or_else(|| AppError::ExternalApi("Auth response missing user".to_string()))?;

        Ok(Session {
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            access_token,
            expires_at: body
                .expires_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            refresh_token: body.refresh_token,
        })
    }

    async fn check_auth_response(response: Response) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiAuthError>(&body)
            .ok()
            .and_then(ApiAuthError::into_message)
            .unwrap_or_else(|| format!("Auth service returned status {}", status));

        if status.is_server_error() {
            return Err(AppError::ExternalApi(message));
        }
        Err(AppError::Auth(message))
    }

    async fn check_table_response(response: Response) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::ExternalApi(format!(
            "API returned status {}: {}",
            status, body
        )))
    }

    async fn token_grant<T: Serialize + ?Sized>(&self, url: String, body: &T) -> AppResult<Session> {
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await?;

        let response = Self::check_auth_response(response).await?;
        let body: ApiSessionResponse = response.json().await?;
        let session = self.session_from_response(body)?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn password_grant(&self, url: String, email: &str, password: &str) -> AppResult<Session> {
        self.token_grant(url, &PasswordCredentials { email, password })
            .await
    }

    /// Exchanges the refresh token for a new session
    ///
    /// A refusal from the auth service ends the session; transport and server
    /// errors leave it in place.
    async fn refresh_session(&self) -> AppResult<Session> {
        let refresh_token = self.current().and_then(|session| session.refresh_token);
        let Some(refresh_token) = refresh_token else {
            tracing::info!("Session expired and cannot be refreshed");
            self.publish(None);
            return Err(AppError::NotAuthenticated);
        };

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.api_url);
        let credentials = RefreshCredentials {
            refresh_token: &refresh_token,
        };
        match self.token_grant(url, &credentials).await {
            Ok(session) => {
                tracing::debug!(user_id = %session.user_id, "Access token refreshed");
                Ok(session)
            }
            Err(AppError::Auth(message)) => {
                tracing::info!(reason = %message, "Session refresh refused, signing out");
                self.publish(None);
                Err(AppError::NotAuthenticated)
            }
            Err(e) => Err(e),
        }
    }

    /// Access token for the current session, refreshed if it is about to expire
    async fn fresh_token(&self) -> AppResult<String> {
        let session = self.current().ok_or(AppError::NotAuthenticated)?;
        if session.expires_within(Duration::seconds(REFRESH_MARGIN_SECS), Utc::now()) {
            return Ok(self.refresh_session().await?.access_token);
        }
        Ok(session.access_token)
    }

    /// Sends a table request as the signed-in user
    ///
    /// A 401 gets one retry after refreshing the session.
    async fn send_table<F>(&self, build: F) -> AppResult<Response>
    where
        F: Fn(&HttpClient) -> RequestBuilder + Send + Sync,
    {
        let token = self.fresh_token().await?;
        let response = self
            .auth_request(build(&self.http_client), &token)
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_table_response(response).await;
        }

        tracing::debug!("Access token rejected, refreshing");
        let token = self.refresh_session().await?.access_token;
        let response = self
            .auth_request(build(&self.http_client), &token)
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.publish(None);
            return Err(AppError::NotAuthenticated);
        }
        Self::check_table_response(response).await
    }
}

#[async_trait::async_trait]
impl RemoteStore for RestStore {
    async fn auth_sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.api_url);
        let session = self.password_grant(url, email, password).await?;

        tracing::info!(user_id = %session.user_id, store = self.name(), "Signed in");
        Ok(session)
    }

    async fn auth_sign_up(&self, email: &str, password: &str) -> AppResult<Session> {
        let url = format!("{}/auth/v1/signup", self.api_url);
        let session = self.password_grant(url, email, password).await?;

        tracing::info!(user_id = %session.user_id, store = self.name(), "Signed up");
        Ok(session)
    }

    async fn auth_sign_out(&self) -> AppResult<()> {
        let Some(token) = self.access_token() else {
            return Ok(());
        };
        self.publish(None);

        let url = format!("{}/auth/v1/logout", self.api_url);
        let response = self
            .auth_request(self.http_client.post(&url), &token)
            .send()
            .await?;

        Self::check_auth_response(response).await?;
        Ok(())
    }

    /// Validates the saved session against the auth service
    ///
    /// Only a rejection ends the session. When the service cannot be reached
    /// the saved session is kept as is.
    async fn auth_current_user(&self) -> AppResult<Option<Session>> {
        if self.current().is_none() {
            return Ok(None);
        }

        let token = match self.fresh_token().await {
            Ok(token) => token,
            Err(AppError::NotAuthenticated) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Could not refresh saved session, keeping it");
                return Ok(self.current());
            }
        };

        let url = format!("{}/auth/v1/user", self.api_url);
        let response = match self
            .auth_request(self.http_client.get(&url), &token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Auth service unreachable, keeping saved session");
                return Ok(self.current());
            }
        };

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Saved session is no longer valid");
            self.publish(None);
            return Ok(None);
        }

        let response = Self::check_auth_response(response).await?;
        let user: ApiUser = response.json().await?;
        let Some(current) = self.current() else {
            return Ok(None);
        };
        Ok(Some(Session {
            user_id: user.id,
            email: user.email.unwrap_or(current.email.clone()),
            ..current
        }))
    }

    fn auth_subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    async fn profile_insert(&self, profile: &Profile) -> AppResult<()> {
        self.send_table(|http| http.post(self.table_url(PROFILE_TABLE)).json(&[profile]))
            .await?;
        Ok(())
    }

    async fn collection_insert(&self, item: &NewCollectionItem) -> AppResult<()> {
        self.send_table(|http| http.post(self.table_url(COLLECTION_TABLE)).json(item))
            .await?;
        Ok(())
    }

    async fn collection_select(&self, query: &CollectionQuery) -> AppResult<Vec<CollectionItem>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", query.owner_id)),
            ("status", format!("eq.{}", query.status)),
        ];
        if let Some(media_type) = query.media_type {
            params.push(("media_type", format!("eq.{}", media_type)));
        }

        let response = self
            .send_table(|http| http.get(self.table_url(COLLECTION_TABLE)).query(&params))
            .await?;
        let items: Vec<CollectionItem> = response.json().await?;

        tracing::debug!(
            owner_id = %query.owner_id,
            status = %query.status,
            items = items.len(),
            "Collection fetched"
        );

        Ok(items)
    }

    async fn collection_update(&self, id: Uuid, fields: &ItemUpdate) -> AppResult<()> {
        let filter = [("id", format!("eq.{}", id))];
        self.send_table(|http| {
            http.patch(self.table_url(COLLECTION_TABLE))
                .query(&filter)
                .json(fields)
        })
        .await?;
        Ok(())
    }

    async fn collection_delete(&self, id: Uuid) -> AppResult<()> {
        let filter = [("id", format!("eq.{}", id))];
        self.send_table(|http| http.delete(self.table_url(COLLECTION_TABLE)).query(&filter))
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
