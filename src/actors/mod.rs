//! Long-running actors of the monitor
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! handle returned by its `spawn` function.
//!
//! ```text
//!              ┌──────────────┐  RunNow / Shutdown   ┌──────────────────┐
//!  handle ───► │  Scheduler   │ ───── probe ───────► │  Prober (ping)   │
//!              └──────┬───────┘                      └──────────────────┘
//!                     │ record_outcome
//!              ┌──────▼───────┐    snapshots    ┌──────────────────┐
//!              │   Monitor    │ ◄────────────── │  CommandServer   │ ◄── getUpdates
//!              └──────┬───────┘                 └────────┬─────────┘
//!                     │ log, metrics, alerts             │ /rebuildcron
//!                     ▼                                  ▼
//!                ProbeLog / MetricsWriter /        MaintenanceDelegate
//!                AlertDispatcher
//! ```
//!
//! Both actors observe the same `CancellationToken`. The scheduler finishes
//! the probe round in progress, the command server finishes the batch of
//! updates in progress, then both exit.
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the scheduler has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for synchronous queries (`RunNow`)
//! 3. **Cancellation**: a shared token for process shutdown

pub mod command_server;
pub mod messages;
pub mod scheduler;
