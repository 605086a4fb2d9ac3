//! Map client: the client-only map host and the click-driven location marker.

pub mod backend;
pub mod geocode;
pub mod host;
pub mod marker;
pub mod templates;

pub use backend::{AccidentAreaApi, AccidentAreaClient};
pub use geocode::{ClickedLocation, NominatimClient, ReverseGeocoder};
pub use host::{MapHost, Scene};
pub use marker::{ClickOutcome, ConfirmOutcome, LocationMarker, MarkerView};
