use crate::domain::model::Slot;
use crate::domain::ports::{CredentialRefresher, ReservationApi, VerificationCodeSource};
use crate::utils::error::{ReserverError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";
const REFRESH_PATH: &str = "/identity/refresh";
const TWO_FACTOR_PATH: &str = "/identity/two-factor";
const TWO_FACTOR_VERIFY_PATH: &str = "/identity/two-factor-verification";

/// Everything the client needs to talk to one queue on behalf of one applicant.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub queue: String,
    pub case_id: String,
    pub name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub two_factor_token: Option<String>,
    pub timeout: Duration,
    pub cookies: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationRequest<'a> {
    proceeding_id: &'a str,
    slot_id: i64,
    name: &'a str,
    last_name: &'a str,
    date_of_birth: &'a str,
}

pub struct HttpReservationClient {
    client: Client,
    settings: ClientSettings,
    code_source: Arc<dyn VerificationCodeSource>,
    referer: String,
    origin: String,
    cookie_header: String,
}

impl HttpReservationClient {
    pub fn new(
        settings: ClientSettings,
        code_source: Arc<dyn VerificationCodeSource>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let referer = settings
            .base_url
            .join(&format!("/home/cases/{}", settings.case_id))
            .map_err(|e| ReserverError::ConfigError {
                message: format!("cannot build referer: {}", e),
            })?
            .to_string();
        let origin = settings.base_url.origin().ascii_serialization();

        let cookie_header = std::iter::once("cookieconsent_status=dismiss".to_string())
            .chain(
                settings
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value)),
            )
            .collect::<Vec<_>>()
            .join("; ");

        Ok(Self {
            client,
            settings,
            code_source,
            referer,
            origin,
            cookie_header,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.settings
            .base_url
            .join(path)
            .map_err(|e| ReserverError::ConfigError {
                message: format!("invalid endpoint path '{}': {}", path, e),
            })
    }

    fn queue_endpoint(&self, tail: &str) -> Result<Url> {
        self.endpoint(&format!(
            "/api/reservations/queue/{}/{}",
            self.settings.queue, tail
        ))
    }

    /// 所有呼叫都是 POST，帶著瀏覽器那一套 header
    fn post(&self, url: Url, token: &str) -> RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(CONTENT_TYPE, "application/json")
            .header(REFERER, &self.referer)
            .header(ORIGIN, &self.origin)
            .header(COOKIE, &self.cookie_header)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let endpoint = url.path().to_string();
        let mut request = self.post(url, token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        tracing::debug!("📡 {} responded {}", endpoint, response.status());

        if response.status() != StatusCode::OK {
            return Err(ReserverError::UnexpectedStatus {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ReservationApi for HttpReservationClient {
    async fn list_dates(&self, token: &str) -> Result<Vec<String>> {
        let url = self.queue_endpoint("dates")?;
        let dates: Vec<String> = self.post_json(url, token, None).await?;
        tracing::debug!("Dates: {:?}", dates);
        Ok(dates)
    }

    async fn list_slots(&self, token: &str, date: NaiveDate) -> Result<Vec<Slot>> {
        let url = self.queue_endpoint(&format!("{}/slots", date.format("%Y-%m-%d")))?;
        let slots: Vec<Slot> = self.post_json(url, token, None).await?;
        tracing::debug!("Slots for {}: {:?}", date, slots);
        Ok(slots)
    }

    async fn submit_reservation(&self, token: &str, slot: &Slot) -> Result<bool> {
        let two_factor = match &self.settings.two_factor_token {
            Some(pre_generated) => pre_generated.clone(),
            None => self.fetch_two_factor_token(token).await?,
        };

        let body = ReservationRequest {
            proceeding_id: &self.settings.case_id,
            slot_id: slot.id,
            name: &self.settings.name,
            last_name: &self.settings.last_name,
            date_of_birth: &self.settings.date_of_birth,
        };

        let response = self
            .post(self.queue_endpoint("reserve")?, token)
            .header("2fa", format!("Bearer {}", two_factor))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::debug!("Reserve slot {} responded {}: {}", slot.id, status, text);

        Ok(status == StatusCode::OK)
    }

    async fn fetch_two_factor_token(&self, token: &str) -> Result<String> {
        tracing::info!("🔑 Requesting two-factor challenge");
        let purpose = serde_json::json!({ "purpose": "MakeAppointment" });
        let mut challenge: Map<String, Value> = self
            .post_json(self.endpoint(TWO_FACTOR_PATH)?, token, Some(&purpose))
            .await?;

        let code = self.code_source.read_code().await?;
        challenge.remove("provider");
        challenge.insert("verificationCode".to_string(), Value::String(code));

        let verified: Map<String, Value> = self
            .post_json(
                self.endpoint(TWO_FACTOR_VERIFY_PATH)?,
                token,
                Some(&Value::Object(challenge)),
            )
            .await?;

        verified
            .get("confirmedToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ReserverError::InputContractViolation {
                message: "two-factor verification returned no confirmedToken".to_string(),
            })
    }
}

#[async_trait]
impl CredentialRefresher for HttpReservationClient {
    async fn refresh_credential(&self, current: &str) -> Result<String> {
        tracing::info!("🔄 Refreshing token");
        let response = self
            .post(self.endpoint(REFRESH_PATH)?, current)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Refresh responded {}", status);
        if status != StatusCode::OK {
            return Err(ReserverError::RefreshFailed {
                reason: format!("refresh endpoint returned {}", status.as_u16()),
            });
        }

        Ok(response.text().await?)
    }
}
