//! Application services shared by the dispatchers.

mod aggregator_registry;
mod delivery_service;
mod read_receipt_aggregator;

pub use aggregator_registry::AggregatorRegistry;
pub use delivery_service::DeliveryService;
pub use read_receipt_aggregator::{AggregatorConfig, AggregatorState, ReadReceiptAggregator};
