use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::coords::LatLon;
use crate::error::OverpassError;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Source of way geometry. The API handlers only see this trait so tests can
/// serve ways from memory.
#[async_trait]
pub trait WaySource: Send + Sync {
    /// Ordered node coordinates of the way, or `None` when the way is unknown.
    async fn way_coordinates(&self, way_id: i64) -> Result<Option<Vec<LatLon>>, OverpassError>;
}

pub struct OverpassClient {
    client: reqwest::Client,
    base_url: String,
}

impl OverpassClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("accident-area/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

pub fn way_query(way_id: i64) -> String {
    format!("[out:json];\nway({way_id});\nout body;\n>;\nout skel qt;")
}

#[async_trait]
impl WaySource for OverpassClient {
    async fn way_coordinates(&self, way_id: i64) -> Result<Option<Vec<LatLon>>, OverpassError> {
        debug!(way_id, "Querying Overpass for way nodes");

        let resp = self
            .client
            .post(&self.base_url)
            .body(way_query(way_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(way_id, status = status.as_u16(), "Overpass request rejected");
            return Err(OverpassError::Status(status.as_u16()));
        }

        let body: OverpassResponse = resp.json().await?;
        Ok(body.way_coordinates())
    }
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        #[serde(default)]
        nodes: Vec<i64>,
    },
    #[serde(other)]
    Other,
}

impl OverpassResponse {
    /// Resolves the first way's node references in order, skipping references
    /// the response has no node for.
    pub fn way_coordinates(&self) -> Option<Vec<LatLon>> {
        let refs = self.elements.iter().find_map(|el| match el {
            Element::Way { nodes } => Some(nodes),
            _ => None,
        })?;

        let positions: HashMap<i64, LatLon> = self
            .elements
            .iter()
            .filter_map(|el| match *el {
                Element::Node { id, lat, lon } => Some((id, LatLon::new(lat, lon))),
                _ => None,
            })
            .collect();

        Some(refs.iter().filter_map(|id| positions.get(id).copied()).collect())
    }
}
