//! Four-level universe map: coordinates, grid layout, region-summary
//! streaming, a layered drawing engine, and the zoom-level view state
//! machine, with Bevy plugins that host it in a window.

pub mod coords;
pub mod data;
pub mod errors;
pub mod layout;
pub mod plugins;
pub mod prefetch;
pub mod summaries;
