use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::coords::LatLon;
use crate::error::ClientError;
use crate::map::backend::AccidentAreaClient;
use crate::map::geocode::NominatimClient;
use crate::map::marker::{LocationMarker, MarkerView};
use crate::map::templates;

pub const CENTER: LatLon = LatLon {
    lat: 55.751244,
    lon: 37.618423,
};
pub const ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayer {
    pub url_template: &'static str,
    pub subdomains: &'static [&'static str],
    pub attribution: &'static str,
    pub attribution_url: &'static str,
}

pub const OSM_TILES: TileLayer = TileLayer {
    url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
    subdomains: &["a", "b", "c"],
    attribution: "© OpenStreetMap contributors",
    attribution_url: "https://www.openstreetmap.org/copyright",
};

impl TileLayer {
    /// Subdomain rotates with the tile position so neighbouring tiles spread
    /// over all tile servers.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        let s = match self.subdomains.len() {
            0 => "",
            n => self.subdomains[((x as usize) + (y as usize)) % n],
        };
        self.url_template
            .replace("{s}", s)
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLon,
    pub zoom: u8,
    pub height: &'static str,
    pub width: &'static str,
}

pub const FULL_VIEWPORT: Viewport = Viewport {
    center: CENTER,
    zoom: ZOOM,
    height: "100vh",
    width: "100vw",
};

/// One frame of the map surface: viewport, the tile layer under it and the
/// marker's panel/overlay on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub viewport: Viewport,
    pub tiles: TileLayer,
    pub marker: MarkerView,
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Map centered on {} at zoom {}",
            self.viewport.center, self.viewport.zoom
        )?;
        writeln!(f, "Tiles: {} ({})", self.tiles.url_template, self.tiles.attribution)?;

        match (&self.marker.panel, &self.marker.error) {
            (Some(panel), _) => writeln!(f, "\n{panel}")?,
            (None, Some(err)) => writeln!(f, "\nLookup failed: {err}")?,
            (None, None) => writeln!(f, "\nNo location selected")?,
        }

        if let Some(overlay) = &self.marker.polygon {
            writeln!(f, "\nAccident area ({}):", overlay.color)?;
            for p in &overlay.points {
                writeln!(f, "  [{}, {}]", p.lat, p.lon)?;
            }
        }
        Ok(())
    }
}

/// Owns the map viewport and mounts the location marker onto it.
///
/// The map surface itself only ever exists in the browser: the server side
/// can hand out the page shell from [`MapHost::render_page`], never a
/// pre-rendered map.
pub struct MapHost {
    config: Config,
    marker: LocationMarker,
}

impl MapHost {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let geocoder = NominatimClient::new(&config.nominatim_url)?;
        let api = AccidentAreaClient::new(&config.api_base)?;
        let marker = LocationMarker::new(Arc::new(geocoder), Arc::new(api));
        Ok(Self::with_marker(config, marker))
    }

    pub fn with_marker(config: &Config, marker: LocationMarker) -> Self {
        Self {
            config: config.clone(),
            marker,
        }
    }

    pub fn marker(&self) -> &LocationMarker {
        &self.marker
    }

    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        OSM_TILES.tile_url(z, x, y)
    }

    pub fn render(&self) -> Scene {
        Scene {
            viewport: FULL_VIEWPORT,
            tiles: OSM_TILES,
            marker: self.marker.view(),
        }
    }

    pub fn render_page(&self) -> String {
        templates::render_map_page(&self.config)
    }
}
