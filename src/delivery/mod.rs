//! Delivery of confirmed bottles once their send time has passed.

mod reconciler;

pub use reconciler::{start_reconciler, DeliveryReconciler, SweepReport};
