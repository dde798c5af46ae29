// Domain layer - Pure types and aggregation rules
pub mod chart;
pub mod error;
pub mod monthly;
pub mod telemetry;
