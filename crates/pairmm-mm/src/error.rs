//! Error types for the quoting engine.

use pairmm_core::{OrderId, Volume};
use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum MakerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Amend for order {order_id} would raise volume from {current} to {requested}")]
    VolumeIncrease {
        order_id: OrderId,
        current: Volume,
        requested: Volume,
    },

    #[error("Session {kind} send failed: {result}")]
    SendFailed {
        kind: &'static str,
        result: &'static str,
    },

    #[error("Engine is inert after disconnect")]
    Inert,
}

pub type MakerResult<T> = Result<T, MakerError>;
