//! Router module for task routing.
//!
//! This module handles selecting the provider and model for a task based on:
//! - Task category
//! - Subscription tier
//! - Which provider credentials are configured

mod rules;
mod selector;
mod types;

pub use rules::{select_route, RouteRule, SelectionContext, ROUTE_RULES};
pub use selector::{build_http_client, Execution, Router};
pub use types::{
    Backend, InvokeOptions, InvokeResponse, ProviderKind, RouteDecision, TaskCategory, TaskRequest,
    Tier, UsageStats,
};
