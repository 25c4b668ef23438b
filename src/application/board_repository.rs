// Repository trait for board data access
use crate::application::errors::FetchError;
use crate::domain::board::{BoardId, BoardItem};
use async_trait::async_trait;

/// Parameters of one board fetch; also the cache key for its result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardQuery {
    pub board_id: BoardId,
    pub page_limit: u32,
}

impl BoardQuery {
    pub fn new(board_id: BoardId, page_limit: u32) -> Self {
        Self { board_id, page_limit }
    }
}

#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// Fetch every item on the board, following pagination to the end
    async fn fetch_items(&self, query: &BoardQuery) -> Result<Vec<BoardItem>, FetchError>;
}
