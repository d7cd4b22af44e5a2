//! HTTP API over the task router and credit calculator.

mod handlers;
mod server;
pub mod stats;

pub use handlers::{
    EstimateResponse, InvokeEnvelope, RouteQuery, CREDITS_HEADER, PROVIDER_HEADER,
    REQUEST_ID_HEADER,
};
pub use server::{create_router, run_server, AppState};
