//! Workflow Service SDK
//!
//! This crate provides everything needed to call or serve the Cadence `WorkflowService`:
//! - API trait (`WorkflowService`)
//! - Typed outbound client (`WorkflowServiceClient`)
//! - Inbound wiring (`procedures`, `register_workflow_service`)
//! - The contract table (`PROCEDURES`, `for_each_workflow_procedure!`)
//!
//! ## Usage
//!
//! ```ignore
//! use workflow_service_sdk::{SERVICE_NAME, WorkflowService, WorkflowServiceClient};
//!
//! let client = WorkflowServiceClient::new(dispatcher.client_config(SERVICE_NAME)?);
//! let response = client.start_workflow_execution(&ctx, request).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === CONTRACT ===
mod contract;
pub mod messages;
pub use contract::{PROCEDURES, find_procedure};

// === API TRAIT ===
mod api;
pub use api::WorkflowService;

// === CLIENT AND WIRING ===
mod client;
mod wiring;
pub use client::WorkflowServiceClient;
pub use wiring::{procedures, register_workflow_service};

/// Destination service name of the Cadence frontend.
pub const SERVICE_NAME: &str = "cadence-frontend";

/// Thrift service every procedure name is prefixed with.
pub const THRIFT_SERVICE: &str = "WorkflowService";
