use reqwest::{Client, Response};
use serde_json::Value;
use shared::{
    domain::{EntityId, EntityKind, EntitySchema},
    protocol::ResponseEnvelope,
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status_code}): {message}")]
    Rejected {
        status_code: u16,
        message: String,
        result: Value,
    },
    #[error("unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{kind} has no id")]
    MissingId { kind: EntityKind },
}

/// HTTP client for the `/api/<collection>` endpoints.
#[derive(Debug, Clone)]
pub struct RacingClient {
    http: Client,
    base_url: Url,
}

impl RacingClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(server_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list<T: EntitySchema>(&self) -> Result<Vec<T>, ClientError> {
        let res = self.http.get(self.collection_url(T::KIND)?).send().await?;
        let result = read_envelope(res).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn create<T: EntitySchema>(&self, entity: &T) -> Result<T, ClientError> {
        let mut body = entity.clone();
        body.set_id(None);
        let res = self
            .http
            .post(self.collection_url(T::KIND)?)
            .json(&body)
            .send()
            .await?;
        let result = read_envelope(res).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn update<T: EntitySchema>(&self, entity: &T) -> Result<T, ClientError> {
        let id = entity
            .id()
            .ok_or(ClientError::MissingId { kind: T::KIND })?;
        let res = self
            .http
            .put(self.entity_url(T::KIND, id)?)
            .json(entity)
            .send()
            .await?;
        let result = read_envelope(res).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn delete<T: EntitySchema>(&self, id: EntityId) -> Result<(), ClientError> {
        let res = self.http.delete(self.entity_url(T::KIND, id)?).send().await?;
        read_envelope(res).await?;
        Ok(())
    }

    fn collection_url(&self, kind: EntityKind) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("api/{}", kind.collection()))?)
    }

    fn entity_url(&self, kind: EntityKind, id: EntityId) -> Result<Url, ClientError> {
        Ok(self
            .base_url
            .join(&format!("api/{}/{}", kind.collection(), id))?)
    }
}

/// Unwraps the envelope's `result`; `success: false` is the only failure
/// signal the server sends, whatever the HTTP status.
async fn read_envelope(res: Response) -> Result<Value, ClientError> {
    let status = res.status();
    let url = res.url().clone();
    let body = res.bytes().await?;
    match serde_json::from_slice::<ResponseEnvelope>(&body) {
        Ok(envelope) if envelope.success => {
            debug!(%url, status_code = envelope.status_code, "request succeeded");
            Ok(envelope.result)
        }
        Ok(envelope) => {
            warn!(%url, status_code = envelope.status_code, message = %envelope.message, "request rejected");
            Err(ClientError::Rejected {
                status_code: envelope.status_code,
                message: envelope.message,
                result: envelope.result,
            })
        }
        Err(_) if !status.is_success() => Err(ClientError::Rejected {
            status_code: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
            result: Value::Null,
        }),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
