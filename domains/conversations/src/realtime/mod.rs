//! Change feed and its client-side reconciliation

pub mod hub;
pub mod recency;
pub mod reconciler;
pub mod session;

pub use hub::{ChangeEvent, EventHub, EventScope};
pub use recency::RecencyList;
pub use reconciler::{ListChange, ReconcileSignal, Reconciler, ViewerContext};
pub use session::{DisplayNames, ViewerSession};
