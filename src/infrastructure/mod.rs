// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod thingsboard_client;
pub mod thingsboard_repository;
