//! HyperFleet end-to-end test harness
//!
//! Drives the HyperFleet cluster and nodepool API through full lifecycles:
//! create a resource, poll its status until conditions converge, check every
//! adapter's report, and cross-check the Kubernetes objects the adapters
//! created.
//!
//! # Example
//!
//! ```no_run
//! use hyperfleet_e2e::condition::READY;
//! use hyperfleet_e2e::config::{self, Overrides};
//! use hyperfleet_e2e::helper::Helper;
//! use hyperfleet_e2e::model::{ConditionStatus, ResourceRef};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(config::load(&Overrides::default())?);
//!     let h = Helper::connect(Arc::clone(&config)).await?;
//!
//!     let id = h.get_test_cluster("testdata/payloads/clusters/gcp.json").await?;
//!     h.wait_for_condition(
//!         &ResourceRef::cluster(&id),
//!         READY,
//!         ConditionStatus::True,
//!         config.timeouts.cluster.ready,
//!     )
//!     .await?;
//!
//!     h.cleanup_test_cluster(&id).await?;
//!     Ok(())
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Run the tier0 scenarios against a local API
//! hyperfleet-e2e --api-url http://localhost:8000 test --label-filter tier0
//! ```

pub mod adapters;
pub mod cli;
pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod helper;
pub mod labels;
pub mod model;
pub mod payload;
pub mod poll;
pub mod report;
pub mod resources;
pub mod runner;
pub mod sequence;
pub mod suite;
pub mod telemetry;
pub mod wait;

// Re-export commonly used types
pub use client::{ApiError, FleetApi, HyperFleetClient};
pub use condition::has_condition;
pub use config::{Config, ConfigError};
pub use error::E2eError;
pub use helper::Helper;
pub use poll::{poll_until, wait_for_condition, PollError, Retryable};
pub use resources::{Expectation, KubeLister, ObjectLister, ResourceError};
pub use wait::{ResourceState, WaitError};
