//! Application layer with dispatchers and the services behind them.

/// Delivery and read-receipt aggregation services.
pub mod services;
/// Queue-event dispatchers.
pub mod use_cases;

pub use services::{AggregatorConfig, AggregatorRegistry, DeliveryService};
pub use use_cases::{ChatFanoutDispatcher, GroupReadMode, ReadFanoutDispatcher, ReadPushOutlet};
