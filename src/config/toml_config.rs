use crate::adapters::http::ClientSettings;
use crate::adapters::telegram::DEFAULT_TELEGRAM_API;
use crate::core::EngineSettings;
use crate::utils::error::{ReserverError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_required_field,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://inpol.mazowieckie.pl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub service: ServiceConfig,
    pub applicant: ApplicantConfig,
    pub auth: Option<AuthConfig>,
    pub telegram: Option<TelegramConfig>,
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub queue: String,
    pub case_id: String,
    pub request_timeout_seconds: Option<u64>,
    pub cookies: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantConfig {
    pub name: String,
    pub last_name: String,
    pub date_of_birth: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
    /// Pre-generated two-factor token; skips the interactive exchange.
    pub two_factor_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_ids: Vec<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub empty_probe_delay_ms: Option<u64>,
    pub refresh_lookahead_seconds: Option<u64>,
    pub target_offset_days: Option<u64>,
    pub window_size: Option<usize>,
    pub watch_horizon_days: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// 空字串或沒被替換的 `${VAR}` 視為沒設定
fn resolved(value: Option<&String>) -> Option<&str> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.contains("${"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ReserverError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${JWT})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
            return content.to_string();
        };

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("service.base_url", &self.service.base_url)?;
        validate_non_empty_string("service.queue", &self.service.queue)?;
        validate_non_empty_string("service.case_id", &self.service.case_id)?;
        validate_non_empty_string("applicant.name", &self.applicant.name)?;
        validate_non_empty_string("applicant.last_name", &self.applicant.last_name)?;
        validate_non_empty_string("applicant.date_of_birth", &self.applicant.date_of_birth)?;

        if let Some(timeout) = self.service.request_timeout_seconds {
            validate_range("service.request_timeout_seconds", timeout, 1, 600)?;
        }

        if let Some(telegram) = &self.telegram {
            if let Some(api_base) = &telegram.api_base {
                validate_url("telegram.api_base", api_base)?;
            }
            // 有設定 chat 就一定要有 bot token
            if !self.telegram_chat_ids().is_empty() {
                let bot_token = validate_required_field("telegram.bot_token", &telegram.bot_token)?;
                validate_non_empty_string("telegram.bot_token", bot_token)?;
            }
        }

        if let Some(engine) = &self.engine {
            if let Some(window) = engine.window_size {
                validate_positive_number("engine.window_size", window, 1)?;
            }
            if let Some(horizon) = engine.watch_horizon_days {
                validate_range("engine.watch_horizon_days", horizon, 1, 60)?;
            }
        }

        Ok(())
    }

    /// Bearer token from the file, if one is actually set.
    pub fn token(&self) -> Option<&str> {
        resolved(self.auth.as_ref().and_then(|a| a.token.as_ref()))
    }

    pub fn two_factor_token(&self) -> Option<&str> {
        resolved(self.auth.as_ref().and_then(|a| a.two_factor_token.as_ref()))
    }

    pub fn telegram_bot_token(&self) -> Option<&str> {
        resolved(self.telegram.as_ref().and_then(|t| t.bot_token.as_ref()))
    }

    pub fn telegram_chat_ids(&self) -> Vec<String> {
        self.telegram
            .as_ref()
            .map(|t| {
                t.chat_ids
                    .iter()
                    .filter_map(|id| resolved(Some(id)))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn telegram_api_base(&self) -> &str {
        self.telegram
            .as_ref()
            .and_then(|t| t.api_base.as_deref())
            .unwrap_or(DEFAULT_TELEGRAM_API)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let defaults = EngineSettings::default();
        let Some(engine) = &self.engine else {
            return defaults;
        };

        EngineSettings {
            empty_probe_delay: engine
                .empty_probe_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.empty_probe_delay),
            refresh_lookahead: engine
                .refresh_lookahead_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_lookahead),
            target_offset_days: engine.target_offset_days.unwrap_or(defaults.target_offset_days),
            window_size: engine.window_size.unwrap_or(defaults.window_size),
            watch_horizon_days: engine.watch_horizon_days.unwrap_or(defaults.watch_horizon_days),
        }
    }

    pub fn client_settings(&self) -> Result<ClientSettings> {
        let base_url = url::Url::parse(&self.service.base_url).map_err(|e| {
            ReserverError::InvalidConfigValueError {
                field: "service.base_url".to_string(),
                value: self.service.base_url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut cookies: Vec<(String, String)> = self
            .service
            .cookies
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, value)| resolved(Some(value)).is_some())
            .collect();
        cookies.sort();

        Ok(ClientSettings {
            base_url,
            queue: self.service.queue.clone(),
            case_id: self.service.case_id.clone(),
            name: self.applicant.name.clone(),
            last_name: self.applicant.last_name.clone(),
            date_of_birth: self.applicant.date_of_birth.clone(),
            two_factor_token: self.two_factor_token().map(str::to_string),
            timeout: Duration::from_secs(self.service.request_timeout_seconds.unwrap_or(30)),
            cookies,
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
