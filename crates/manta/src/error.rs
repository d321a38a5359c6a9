#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph contains an edge with a missing endpoint: edge #{edge}")]
    MissingEndpoint { edge: usize },
    #[error("graph contains a node without an id: node #{index}")]
    MissingNodeId { index: usize },
    #[error("graph contains a duplicate node id: {id}")]
    DuplicateNodeId { id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
