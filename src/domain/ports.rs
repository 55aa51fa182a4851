use crate::domain::model::Slot;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Privileged calls against the reservation service. Every call receives a
/// bearer token that the caller has already validated.
#[async_trait]
pub trait ReservationApi: Send + Sync {
    async fn list_dates(&self, token: &str) -> Result<Vec<String>>;
    async fn list_slots(&self, token: &str, date: NaiveDate) -> Result<Vec<Slot>>;
    async fn submit_reservation(&self, token: &str, slot: &Slot) -> Result<bool>;
    async fn fetch_two_factor_token(&self, token: &str) -> Result<String>;
}

/// 唯一不需要事先驗證 token 的呼叫
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh_credential(&self, current: &str) -> Result<String>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Supplies the one-time code for the two-factor exchange.
#[async_trait]
pub trait VerificationCodeSource: Send + Sync {
    async fn read_code(&self) -> Result<String>;
}
