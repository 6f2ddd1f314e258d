//! HTTP control-plane client
//!
//! `POST /forward/{stream}` with the media description starts forwarding
//! and answers with the forwarder id as plain text.
//! `DELETE /forward/{stream}/{forwarder}` stops it.

use reqwest::{Client, Response, StatusCode};

use super::config::ControlPlaneConfig;
use super::description::MediaDescription;
use super::error::ControlPlaneError;
use super::ControlPlane;

/// Control-plane client speaking HTTP to the origin
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    config: ControlPlaneConfig,
}

impl HttpControlPlane {
    /// Build a client with the configured timeout
    pub fn new(config: ControlPlaneConfig) -> Result<Self, ControlPlaneError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn forward_url(&self, origin: &str, stream_id: &str) -> String {
        format!("{}://{}/forward/{}", self.config.scheme, origin, stream_id)
    }

    async fn read_body(response: Response) -> Result<(StatusCode, String), ControlPlaneError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        Ok((status, body))
    }
}

impl ControlPlane for HttpControlPlane {
    async fn provision(
        &self,
        origin: &str,
        stream_id: &str,
        description: &MediaDescription,
    ) -> Result<String, ControlPlaneError> {
        let body = description
            .to_json()
            .map_err(|e| ControlPlaneError::Encode(e.to_string()))?;
        let url = self.forward_url(origin, stream_id);

        tracing::info!(url = %url, body = %body, "Requesting forward");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(response).await?;
        if status != StatusCode::OK {
            return Err(ControlPlaneError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.trim().to_string())
    }

    async fn teardown(
        &self,
        origin: &str,
        stream_id: &str,
        forwarder_id: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = format!("{}/{}", self.forward_url(origin, stream_id), forwarder_id);

        tracing::info!(url = %url, "Requesting stop forward");

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(response).await?;
        if status != StatusCode::OK {
            return Err(ControlPlaneError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
