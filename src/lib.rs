//! # JT/T 808 telemetry gateway
//!
//! Server side of the JT/T 808 vehicle-terminal protocol: terminals
//! connect over TCP, register and authenticate, then stream location
//! and sensor reports; operators push configuration and control
//! commands through a small HTTP API.
//!
//! The protocol engine lives in [`protocol`]; [`server`] drives it per
//! connection, [`session`] keeps the per-device state, [`telemetry`]
//! folds reports into storage records and [`database`] persists them.

pub mod api;
pub mod database;
pub mod protocol;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod types;

#[derive(Debug, thiserror::Error)]
#[error("jt808-gateway error")]
pub enum Error {
    Io(#[from] std::io::Error),
    Database(#[from] crate::database::Error),
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        crate::database::Error::from(value).into()
    }
}
