//! Per-symbol price synchronization and opportunity fan-out.
//!
//! ```text
//! venue A adapter ─┐
//!                  ├─> SymbolCoordinator (one per symbol) ─> Evaluator
//! venue B adapter ─┘                │
//!                                   ▼
//!                     Supervisor's ObserverRegistry ─> observers
//! ```

mod coordinator;
mod error;
mod event;
mod observer;
mod supervisor;

pub use coordinator::SymbolCoordinator;
pub use error::MonitorError;
pub use event::MonitorEvent;
pub use observer::{Observer, ObserverRegistry};
pub use supervisor::Supervisor;

#[cfg(test)]
mod tests;
