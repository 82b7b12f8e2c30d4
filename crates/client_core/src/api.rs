use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::UserId,
    error::{ApiErrorBody, RemoteError},
    protocol::{
        CreateProfileRequest, LoginRequest, LoginResponse, Profile, ProfileSummary,
        RegisterRequest,
    },
};
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://apiautentificacion.onrender.com/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Calls the session controller makes against the auth/profile service.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RemoteError>;
    async fn register(&self, request: &RegisterRequest) -> Result<(), RemoteError>;
    /// Existence check for the user's profile, decided by status alone:
    /// any success is `Ok`, 404 is [`RemoteError::NotFound`].
    async fn profile_exists(&self, user_id: UserId, token: &str) -> Result<(), RemoteError>;
    async fn fetch_profile(&self, user_id: UserId, token: &str) -> Result<Profile, RemoteError>;
    async fn create_profile(
        &self,
        token: &str,
        request: &CreateProfileRequest,
    ) -> Result<(), RemoteError>;
    async fn list_public_profiles(&self, token: &str) -> Result<Vec<ProfileSummary>, RemoteError>;
}

pub struct HttpProfileApi {
    http: Client,
    base_url: String,
}

impl HttpProfileApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid api base url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "api base url must be http or https, got '{}'",
                parsed.scheme()
            ));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn profile_request(&self, user_id: UserId, token: &str) -> RequestBuilder {
        self.http
            .get(self.endpoint(&format!("/perfiles/usuario/{user_id}")))
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(map_transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(decode_failure(response).await)
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RemoteError> {
        debug!("api: POST /auth/login");
        let response = self
            .send(self.http.post(self.endpoint("/auth/login")).json(request))
            .await?;
        decode_json(response).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), RemoteError> {
        debug!("api: POST /auth/register");
        self.send(self.http.post(self.endpoint("/auth/register")).json(request))
            .await?;
        Ok(())
    }

    async fn profile_exists(&self, user_id: UserId, token: &str) -> Result<(), RemoteError> {
        debug!("api: GET /perfiles/usuario/{user_id} (existence)");
        self.send(self.profile_request(user_id, token)).await?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: UserId, token: &str) -> Result<Profile, RemoteError> {
        debug!("api: GET /perfiles/usuario/{user_id}");
        let response = self.send(self.profile_request(user_id, token)).await?;
        decode_json(response).await
    }

    async fn create_profile(
        &self,
        token: &str,
        request: &CreateProfileRequest,
    ) -> Result<(), RemoteError> {
        debug!("api: POST /perfiles user_id={}", request.usuario.id);
        self.send(
            self.http
                .post(self.endpoint("/perfiles"))
                .bearer_auth(token)
                .json(request),
        )
        .await?;
        Ok(())
    }

    async fn list_public_profiles(&self, token: &str) -> Result<Vec<ProfileSummary>, RemoteError> {
        debug!("api: GET /perfiles/publicos");
        let response = self
            .send(
                self.http
                    .get(self.endpoint("/perfiles/publicos"))
                    .bearer_auth(token),
            )
            .await?;
        decode_json(response).await
    }
}

fn map_transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Unreachable(err.to_string())
    }
}

async fn decode_failure(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let message = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ApiErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message)
            .filter(|message| !message.trim().is_empty()),
        Err(_) => None,
    };
    RemoteError::from_status(status, message)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice(&body).map_err(|err| RemoteError::Decode(err.to_string()))
}
