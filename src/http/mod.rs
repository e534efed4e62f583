//! HTTP API for the companion app
//!
//! - GET /health - Health check
//! - GET /tracking/status - Current tracking state
//! - PUT /tracking/battery-optimization - Toggle the battery cap
//! - PUT /tracking/data-sharing - Toggle precise data sharing
//! - GET /trips - All stored trips
//! - GET /trips/summary?period=week|month|year|all - Travel summary
//! - GET /trips/export - Export every trip
//! - POST /trips/:id/purpose - Confirm a trip's purpose
//! - DELETE /trips/:id - Delete a trip

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
