//! HTTP API for operating outbound calls:
//! - POST /calls - Start an outbound call
//! - GET /calls/:id - Query live call status
//! - GET /calls/:id/disposition - Current disposition snapshot
//! - POST /calls/:id/end - End a call early
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
