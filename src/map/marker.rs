use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::coords::LatLon;
use crate::map::backend::AccidentAreaApi;
use crate::map::geocode::{ClickedLocation, ReverseGeocoder};

pub const POLYGON_COLOR: &str = "red";

/// Click behavior attached to the map: reverse-geocodes the clicked point and,
/// for ways, fetches and holds the accident area polygon.
///
/// Every click starts a new generation. Requests started under an older
/// generation are abandoned as soon as a newer click arrives, and their results
/// are never written back, so only the latest click can drive what is shown.
pub struct LocationMarker {
    geocoder: Arc<dyn ReverseGeocoder>,
    api: Arc<dyn AccidentAreaApi>,
    state: Mutex<MarkerState>,
    generation: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct MarkerState {
    clicked_location: Option<ClickedLocation>,
    /// Generation `clicked_location` was resolved for.
    located_generation: u64,
    polygon: Option<Vec<LatLon>>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Located,
    Failed,
    /// A newer click arrived before this one resolved.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Polygon with this many points is now shown.
    Drawn(usize),
    Disabled,
    Failed,
    Superseded,
}

impl LocationMarker {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, api: Arc<dyn AccidentAreaApi>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            geocoder,
            api,
            state: Mutex::new(MarkerState::default()),
            generation,
        }
    }

    pub async fn on_click(&self, point: LatLon) -> ClickOutcome {
        let generation = self.begin_click();
        debug!(generation, %point, "Map clicked");

        let Some(result) = self
            .unless_superseded(generation, self.geocoder.reverse(point))
            .await
        else {
            debug!(generation, "Reverse geocode abandoned");
            return ClickOutcome::Superseded;
        };
        let result = result.and_then(ClickedLocation::try_from);

        let mut state = self.lock();
        if self.current_generation() != generation {
            return ClickOutcome::Superseded;
        }

        match result {
            Ok(location) => {
                info!(address = %location.address, way_id = ?location.way_id, "Location resolved");
                state.clicked_location = Some(location);
                state.located_generation = generation;
                state.last_error = None;
                ClickOutcome::Located
            }
            Err(e) => {
                warn!(error = %e, %point, "Reverse geocode failed");
                state.last_error = Some(e.to_string());
                ClickOutcome::Failed
            }
        }
    }

    pub async fn confirm(&self) -> ConfirmOutcome {
        let (generation, way_id) = {
            let state = self.lock();
            match self.confirmable_way(&state) {
                Some(way_id) => (state.located_generation, way_id),
                None => return ConfirmOutcome::Disabled,
            }
        };

        let Some(result) = self
            .unless_superseded(generation, self.api.accident_area(way_id))
            .await
        else {
            return ConfirmOutcome::Superseded;
        };

        match result {
            Ok(points) => {
                let mut state = self.lock();
                if self.current_generation() != generation {
                    return ConfirmOutcome::Superseded;
                }
                let n = points.len();
                info!(way_id, points = n, "Accident area loaded");
                state.polygon = Some(points);
                ConfirmOutcome::Drawn(n)
            }
            Err(e) => {
                error!(way_id, error = %e, "Failed to load accident area");
                ConfirmOutcome::Failed
            }
        }
    }

    pub fn clicked_location(&self) -> Option<ClickedLocation> {
        self.lock().clicked_location.clone()
    }

    pub fn polygon(&self) -> Option<Vec<LatLon>> {
        self.lock().polygon.clone()
    }

    pub fn confirm_enabled(&self) -> bool {
        let state = self.lock();
        self.confirmable_way(&state).is_some()
    }

    pub fn view(&self) -> MarkerView {
        let state = self.lock();
        let confirm_enabled = self.confirmable_way(&state).is_some();

        let panel = state.clicked_location.as_ref().map(|location| PanelView {
            address: location.address.clone(),
            way_id: location.way_id,
            confirm_enabled,
            error: state.last_error.clone(),
        });
        let polygon = state.polygon.as_ref().map(|points| PolygonOverlay {
            points: points.clone(),
            color: POLYGON_COLOR,
        });

        MarkerView {
            panel,
            polygon,
            error: state.last_error.clone(),
        }
    }

    /// Clears the polygon and moves to a new generation, which also cancels
    /// whatever the previous generation still has in flight.
    fn begin_click(&self) -> u64 {
        let mut state = self.lock();
        state.polygon = None;
        self.generation.send_modify(|g| *g += 1);
        self.current_generation()
    }

    /// A way id is only confirmable while it belongs to the latest click.
    fn confirmable_way(&self, state: &MarkerState) -> Option<i64> {
        if state.located_generation != self.current_generation() {
            return None;
        }
        state.clicked_location.as_ref().and_then(|l| l.way_id)
    }

    fn current_generation(&self) -> u64 {
        *self.generation.borrow()
    }

    async fn unless_superseded<F: Future>(&self, generation: u64, fut: F) -> Option<F::Output> {
        let mut rx = self.generation.subscribe();
        tokio::select! {
            out = fut => Some(out),
            _ = rx.wait_for(|g| *g != generation) => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MarkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything the marker contributes to the map surface.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    pub panel: Option<PanelView>,
    pub polygon: Option<PolygonOverlay>,
    /// Failure of the latest lookup. Present even when no location was ever
    /// resolved, so a failed first click still reaches the renderer.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub address: String,
    pub way_id: Option<i64>,
    pub confirm_enabled: bool,
    pub error: Option<String>,
}

impl PanelView {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.address.clone()];
        if let Some(id) = self.way_id {
            lines.push(format!("Way ID: {id}"));
        }
        if let Some(err) = &self.error {
            lines.push(format!("Lookup failed: {err}"));
        }
        let button = if self.confirm_enabled {
            "[Confirm accident]"
        } else {
            "[Confirm accident] (disabled)"
        };
        lines.push(button.to_string());
        lines
    }
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonOverlay {
    pub points: Vec<LatLon>,
    pub color: &'static str,
}
