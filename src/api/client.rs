use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use reqwest::{Client, ClientBuilder};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use uuid::Uuid;

use crate::error::LabError;

use super::models::*;

/// Live console websocket, as handed out by [`LabClient::open_console`].
pub type ConsoleStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session-scoped client for the virtual-hardware lab API.
///
/// Holds the HTTP connection pool and, after [`login`](Self::login),
/// the bearer token every other call authenticates with. Passed
/// explicitly wherever the lab is talked to; there is no global
/// session.
#[derive(Debug, Clone)]
pub struct LabClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl LabClient {
    pub fn new(endpoint: &str) -> Result<Self, LabError> {
        Self::with_timeout(endpoint, Duration::from_secs(60))
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, LabError> {
        // Validate before any request goes out
        Url::parse(endpoint)?;

        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent("labctl/0.1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token(&self) -> Result<&str, LabError> {
        self.token.as_deref().ok_or(LabError::NotLoggedIn)
    }

    /// Exchange the long-lived API token for a session token.
    pub async fn login(&mut self, api_token: &str) -> Result<(), LabError> {
        let url = format!("{}/v1/auth/login", self.base_url);
        let body = serde_json::json!({ "apiToken": api_token });

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(response).await?;

        let token: TokenResponse = response.json().await?;
        self.token = Some(token.token);
        Ok(())
    }

    pub async fn projects(&self) -> Result<Vec<Project>, LabError> {
        self.get_json("/v1/projects").await
    }

    pub async fn models(&self) -> Result<Vec<HardwareModel>, LabError> {
        self.get_json("/v1/models").await
    }

    pub async fn model_software(&self, model: &str) -> Result<Vec<Software>, LabError> {
        self.get_json(&format!("/v1/models/{model}/software")).await
    }

    pub async fn instances(&self) -> Result<Vec<Instance>, LabError> {
        self.get_json("/v1/instances").await
    }

    pub async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<Instance, LabError> {
        let url = format!("{}/v1/instances", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }

    /// Current lifecycle state. The endpoint answers with the bare
    /// state word (optionally JSON-quoted).
    pub async fn instance_state(&self, id: Uuid) -> Result<InstanceState, LabError> {
        let url = format!("{}/v1/instances/{id}/state", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;
        let response = check_status(response).await?;

        let status = response.status();
        let body = response.text().await?;
        body.trim()
            .trim_matches('"')
            .parse()
            .map_err(|_| LabError::Api { status, body })
    }

    pub async fn start_instance(&self, id: Uuid) -> Result<(), LabError> {
        self.post_empty(&format!("/v1/instances/{id}/start")).await
    }

    pub async fn reboot_instance(&self, id: Uuid) -> Result<(), LabError> {
        self.post_empty(&format!("/v1/instances/{id}/reboot")).await
    }

    /// Upload a firmware image and attach it to an instance. The
    /// image travels as a multipart form with a fixed `plain`
    /// encoding; `kind` selects how the lab applies it on next boot.
    pub async fn upload_firmware(
        &self,
        kind: ImageKind,
        name: &str,
        instance: Uuid,
        path: &Path,
    ) -> Result<(), LabError> {
        let url = format!("{}/v1/images", self.base_url);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LabError::FirmwareRead {
                path: path.display().to_string(),
                source,
            })?;

        let form = multipart::Form::new()
            .text("type", kind.as_str())
            .text("encoding", "plain")
            .text("name", name.to_string())
            .text("instance", instance.to_string())
            .part("file", multipart::Part::bytes(bytes).file_name(name.to_string()));

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .multipart(form)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn instance_gpios(&self, id: Uuid) -> Result<GpioState, LabError> {
        self.get_json(&format!("/v1/instances/{id}/gpios")).await
    }

    pub async fn set_instance_gpios(&self, id: Uuid, patch: &GpioState) -> Result<(), LabError> {
        self.put_json(&format!("/v1/instances/{id}/gpios"), patch)
            .await
    }

    pub async fn instance_peripherals(&self, id: Uuid) -> Result<Peripherals, LabError> {
        self.get_json(&format!("/v1/instances/{id}/peripherals"))
            .await
    }

    pub async fn set_instance_peripherals(
        &self,
        id: Uuid,
        patch: &Peripherals,
    ) -> Result<(), LabError> {
        self.put_json(&format!("/v1/instances/{id}/peripherals"), patch)
            .await
    }

    pub async fn console_endpoint(&self, id: Uuid) -> Result<ConsoleEndpoint, LabError> {
        self.get_json(&format!("/v1/instances/{id}/console")).await
    }

    /// Open the live console stream for an instance.
    pub async fn open_console(&self, id: Uuid) -> Result<ConsoleStream, LabError> {
        let endpoint = self.console_endpoint(id).await?;
        let (stream, _response) = connect_async(endpoint.url.as_str()).await?;
        Ok(stream)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, LabError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }

    async fn put_json<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<(), LabError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(self.token()?)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn post_empty(&self, path: &str) -> Result<(), LabError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LabError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LabError::Api { status, body })
}
