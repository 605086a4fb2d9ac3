use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::coords::LatLon;
use crate::error::ClientError;

/// Distance the map client asks the backend to extend a way by.
pub const EXTENSION_METERS: u32 = 50;

#[async_trait]
pub trait AccidentAreaApi: Send + Sync {
    async fn accident_area(&self, way_id: i64) -> Result<Vec<LatLon>, ClientError>;
}

/// Client for the accident area endpoint of the backend.
pub struct AccidentAreaClient {
    client: reqwest::Client,
    api_base: String,
}

impl AccidentAreaClient {
    pub fn new(api_base: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, way_id: i64) -> String {
        accident_area_url(&self.api_base, way_id)
    }
}

pub fn accident_area_url(api_base: &str, way_id: i64) -> String {
    format!(
        "{}/api/v1/accidents/accident_area?way_id={way_id}&extension_meters={EXTENSION_METERS}",
        api_base.trim_end_matches('/')
    )
}

#[async_trait]
impl AccidentAreaApi for AccidentAreaClient {
    async fn accident_area(&self, way_id: i64) -> Result<Vec<LatLon>, ClientError> {
        let url = self.url_for(way_id);
        debug!(%url, "Requesting accident area");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(resp.json().await?)
    }
}
