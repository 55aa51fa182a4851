pub mod committer;
pub mod credential;
pub mod prober;
pub mod reserver;
pub mod session;
pub mod strategies;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{EngineSettings, ReservationOutcome, Slot, Strategy};
pub use crate::domain::ports::{
    CredentialRefresher, Notifier, ReservationApi, VerificationCodeSource,
};
pub use crate::utils::error::Result;
