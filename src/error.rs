pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no such variable '{variable}' in table {table}")]
    NoSuchVariable { table: String, variable: String },

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("invalid aggregation: {0}")]
    InvalidAggregation(String),

    #[error("pipeline state error: {0}")]
    PipelineState(&'static str),

    /// Raised by [`EngineClient`](crate::engine::EngineClient)
    /// implementations when the engine cannot be reached.
    #[error("search engine transport error: {0}")]
    Transport(String),
}
