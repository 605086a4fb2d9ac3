//! Accident area map: a click-to-locate map client and the backend that
//! computes the accident area around an OSM way.

pub mod api;
pub mod area;
pub mod config;
pub mod coords;
pub mod error;
pub mod map;
pub mod overpass;

pub use config::Config;
pub use coords::LatLon;
