pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{HttpReservationClient, NoopNotifier, StdinCodePrompt, TelegramNotifier};
pub use config::TomlConfig;
pub use core::{reserver::Reserver, session::SessionBootstrap};
pub use domain::model::{EngineSettings, ReservationOutcome, Slot, Strategy};
pub use utils::error::{ReserverError, Result};
