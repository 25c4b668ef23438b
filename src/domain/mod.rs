// Domain layer - Board items, normalized records and aggregates
pub mod aggregate;
pub mod board;
pub mod dashboard;
pub mod record;
