//! idealab-router - AI task routing and credit metering
//!
//! Picks a provider and model for each AI task in the idea-management app,
//! performs the call, and converts the reported token usage into credits.

pub mod config;
pub mod credits;
pub mod error;
pub mod provider;
pub mod router;
pub mod server;
pub mod storage;
pub mod usage;

pub use config::Config;
pub use credits::{credit_cost, CostInput};
pub use error::{Error, Result};
pub use router::{RouteDecision, Router, TaskCategory, TaskRequest, Tier};
