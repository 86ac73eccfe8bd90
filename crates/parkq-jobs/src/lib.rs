//! Parkq Jobs - Lease-Coordinated Lookup Queue
//!
//! An in-memory queue that hands parking-ticket lookups to remote workers
//! under time-bounded leases:
//! - One resident job per ticket/plate pair (duplicates are coalesced)
//! - FIFO assignment, at most one job per worker
//! - Heartbeats extend a lease; silent workers lose it
//! - Configurable timeout policy (requeue or drop)
//! - Results are delivered once, then forgotten
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Parkq Jobs Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  Producer (enqueue / status)        Worker (work / hb / result) │
//! │     │                                     │                     │
//! │     └──────────────┬──────────────────────┘                     │
//! │                    ▼                                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                   LeaseGateway                          │    │
//! │  │     validation · ownership checks · single lock         │    │
//! │  └────────────────────────┬────────────────────────────────┘    │
//! │                           ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                LeaseState (Mutex)                       │    │
//! │  │  ┌──────────────────┐        ┌──────────────────────┐   │    │
//! │  │  │    JobStore      │◄──────►│   WorkerRegistry     │   │    │
//! │  │  │ pending (FIFO)   │ lease  │ current_job per      │   │    │
//! │  │  │ assigned/terminal│  link  │ worker               │   │    │
//! │  │  └──────────────────┘        └──────────────────────┘   │    │
//! │  └────────────────────────▲────────────────────────────────┘    │
//! │                           │                                     │
//! │                  ┌────────┴────────┐                            │
//! │                  │  LeaseMonitor   │  sweep every tick:         │
//! │                  │  (reaper task)  │  expire · purge · prune    │
//! │                  └─────────────────┘                            │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use parkq_jobs::{LeaseConfig, LeaseGateway, LookupOutcome, WorkOffer};
//!
//! let gateway = LeaseGateway::new(LeaseConfig::default());
//! let monitor = gateway.lease_monitor();
//! tokio::spawn(async move { monitor.start().await });
//!
//! gateway.enqueue("PM451052", "CZCL340")?;
//!
//! if let WorkOffer::Assigned(job) = gateway.request_work("worker-1")? {
//!     gateway.heartbeat("worker-1", "PM451052", "CZCL340")?;
//!     gateway.submit_result(
//!         "worker-1",
//!         "PM451052",
//!         "CZCL340",
//!         LookupOutcome::Success(serde_json::json!({ "amount": "30.00" })),
//!     )?;
//! }
//!
//! let job = gateway.status("PM451052", "CZCL340")?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod job;
pub mod key;
pub mod lease_monitor;
pub mod metrics;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod worker;
pub mod worker_registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LeaseConfig;
pub use error::{LeaseError, LeaseResult, LookupError};
pub use executor::LookupExecutor;
pub use gateway::{LeaseGateway, LookupOutcome, QueueStats};
pub use job::{Job, JobState, JobStatus};
pub use key::{JobKey, WorkerId};
pub use lease_monitor::{LeaseMonitor, SweepReport};
pub use metrics::{register_metrics, QueueMetrics, WorkerMetrics};
pub use scheduler::{Scheduler, WorkOffer};
pub use state::{LeaseState, SharedLeaseState};
pub use store::{EnqueueOutcome, JobCounts, JobStore, Reclaimed};
pub use worker::{LeaseWorker, LeaseWorkerConfig, LeaseWorkerStats};
pub use worker_registry::{WorkerInfo, WorkerRegistry};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::gateway::{LeaseGateway, LookupOutcome};
    pub use crate::job::{Job, JobStatus};
    pub use crate::scheduler::WorkOffer;
    pub use crate::{JobKey, LeaseConfig, LeaseError, LeaseResult, WorkerId};
}
