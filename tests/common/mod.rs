#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use slot_reserver::adapters::ClientSettings;
use slot_reserver::domain::ports::VerificationCodeSource;
use std::time::Duration;
use url::Url;

pub const QUEUE: &str = "queue-7";
pub const CASE: &str = "case-42";

/// 只有 exp 有意義的假 JWT
pub fn jwt_expiring_in(seconds: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = chrono::Utc::now().timestamp() + seconds;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"tester","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

pub fn settings(base_url: &str, two_factor_token: Option<&str>) -> ClientSettings {
    ClientSettings {
        base_url: Url::parse(base_url).expect("mock server url"),
        queue: QUEUE.to_string(),
        case_id: CASE.to_string(),
        name: "Jan".to_string(),
        last_name: "Kowalski".to_string(),
        date_of_birth: "1990-01-01".to_string(),
        two_factor_token: two_factor_token.map(str::to_string),
        timeout: Duration::from_secs(5),
        cookies: Vec::new(),
    }
}

pub fn queue_path(tail: &str) -> String {
    format!("/api/reservations/queue/{}/{}", QUEUE, tail)
}

pub struct FixedCode(pub &'static str);

#[async_trait]
impl VerificationCodeSource for FixedCode {
    async fn read_code(&self) -> slot_reserver::Result<String> {
        Ok(self.0.to_string())
    }
}
