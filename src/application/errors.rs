// Error taxonomy for fetching and building dashboards
use crate::domain::board::BoardId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Monday.com rejected the API token: {0}")]
    Auth(String),

    #[error("Board {board_id} was not found or is not accessible: {message}")]
    BoardNotFound { board_id: BoardId, message: String },

    #[error("Network error talking to Monday.com after {attempts} attempts: {message}")]
    TransientNetwork { attempts: u32, message: String },

    #[error("Unexpected response from Monday.com: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Auth(_) => "auth",
            FetchError::BoardNotFound { .. } => "board_not_found",
            FetchError::TransientNetwork { .. } => "network",
            FetchError::InvalidResponse(_) => "invalid_response",
        }
    }

    /// What the user should do about it
    pub fn remedy(&self) -> &'static str {
        match self {
            FetchError::Auth(_) => "Check that the Monday.com API token is set and still valid.",
            FetchError::BoardNotFound { .. } => {
                "Check the configured board id and that the token's user can see the board."
            }
            FetchError::TransientNetwork { .. } => "Monday.com could not be reached. Try again shortly.",
            FetchError::InvalidResponse(_) => "Monday.com returned data in an unexpected shape.",
        }
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Unknown dashboard: {0}")]
    UnknownDashboard(String),

    #[error("Dashboard '{dashboard}' has no dimension '{dimension}'")]
    UnknownDimension { dashboard: String, dimension: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
