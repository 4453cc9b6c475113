use thiserror::Error;

mod domain_types;
mod ids;

pub use domain_types::*;
pub use ids::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid node id: {id} - {reason}")]
    InvalidNodeId { id: String, reason: String },

    #[error("Invalid access token format: {reason}")]
    InvalidAccessToken { reason: String },

    #[error("Value out of bounds: {value}, expected {min}..={max}")]
    OutOfBounds { value: u32, min: u32, max: u32 },

    #[error("Empty required field: {0}")]
    EmptyField(&'static str),

    #[error("Invalid time bound {value}: {reason}")]
    InvalidTimeBound { value: String, reason: String },
}
