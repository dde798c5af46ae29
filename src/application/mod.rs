// Application layer - Use cases over the telemetry repository
pub mod dashboard_worker;
pub mod refresh_service;
pub mod telemetry_repository;
pub mod telemetry_service;
