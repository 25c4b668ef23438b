// Application layer - Use cases and the fetch/normalize/aggregate pipeline
pub mod aggregator;
pub mod board_repository;
pub mod cache;
pub mod dashboard_service;
pub mod errors;
pub mod normalizer;
pub mod record_filter;
