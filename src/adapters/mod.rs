// Adapters layer: concrete implementations of the domain ports (http, telegram, terminal)

pub mod http;
pub mod prompt;
pub mod telegram;

pub use http::{ClientSettings, HttpReservationClient};
pub use prompt::StdinCodePrompt;
pub use telegram::{NoopNotifier, TelegramNotifier};
