//! Errors surfaced by the controller harness.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManagerError>;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{controller} controller task join failed")]
    ControllerJoin {
        controller: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
