use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::coords::LatLon;
use crate::error::ClientError;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// A reverse geocoding result as returned by Nominatim's `jsonv2` format.
/// Only the fields the marker reads are kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReversePlace {
    pub display_name: Option<String>,
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
}

/// What the marker keeps about the last clicked point.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickedLocation {
    pub address: String,
    pub way_id: Option<i64>,
}

impl TryFrom<ReversePlace> for ClickedLocation {
    type Error = ClientError;

    fn try_from(place: ReversePlace) -> Result<Self, Self::Error> {
        let address = place.display_name.ok_or(ClientError::Missing("display_name"))?;
        // Only ways can be turned into an accident area; nodes and relations can't.
        let way_id = match place.osm_type.as_deref() {
            Some("way") => Some(place.osm_id.ok_or(ClientError::Missing("osm_id"))?),
            _ => None,
        };
        Ok(Self { address, way_id })
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, point: LatLon) -> Result<ReversePlace, ClientError>;
}

pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // Nominatim's usage policy rejects requests without an identifying agent.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("accident-area/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn reverse_url(&self, point: LatLon) -> String {
        reverse_url(&self.base_url, point)
    }
}

pub fn reverse_url(base_url: &str, point: LatLon) -> String {
    format!(
        "{}/reverse?format=jsonv2&lat={}&lon={}",
        base_url.trim_end_matches('/'),
        point.lat,
        point.lon
    )
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, point: LatLon) -> Result<ReversePlace, ClientError> {
        let url = self.reverse_url(point);
        debug!(%url, "Reverse geocoding");

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
