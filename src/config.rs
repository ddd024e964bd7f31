//! Service configuration, read from the environment (`.env` is loaded by `main`).

use chrono::{Duration, FixedOffset};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::domain::value_objects::RateConversion;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FRONTEND_RESULT_URL: &str = "http://localhost:3000/payment-result";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.to_string() }
}

/// Merchant settings for the VNPay gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub pay_url: Url,
    pub return_url: String,
    pub tmn_code: String,
    pub hash_secret: String,
    pub version: String,
    pub command: String,
    pub currency: String,
    pub locale: String,
    pub order_type: String,
    pub link_ttl: Duration,
    /// Gateway-local time zone for `vnp_CreateDate` / `vnp_ExpireDate`.
    pub utc_offset: FixedOffset,
    pub default_ip: String,
}

impl GatewayConfig {
    /// Required settings; everything else takes the gateway's documented defaults.
    pub fn new(pay_url: &str, return_url: &str, tmn_code: &str, hash_secret: &str) -> Result<Self, ConfigError> {
        let pay_url = Url::parse(pay_url).map_err(|e| invalid("VNPAY_PAY_URL", e))?;
        if pay_url.cannot_be_a_base() || pay_url.query().is_some() {
            return Err(invalid("VNPAY_PAY_URL", "must be an absolute URL without a query"));
        }
        Url::parse(return_url).map_err(|e| invalid("VNPAY_RETURN_URL", e))?;
        if tmn_code.trim().is_empty() { return Err(ConfigError::Missing("VNPAY_TMN_CODE")); }
        if hash_secret.is_empty() { return Err(ConfigError::Missing("VNPAY_HASH_SECRET")); }
        Ok(Self {
            pay_url,
            return_url: return_url.to_string(),
            tmn_code: tmn_code.to_string(),
            hash_secret: hash_secret.to_string(),
            version: "2.1.0".into(),
            command: "pay".into(),
            currency: "VND".into(),
            locale: "vn".into(),
            order_type: "200000".into(),
            link_ttl: Duration::minutes(15),
            utc_offset: FixedOffset::east_opt(7 * 3600).ok_or_else(|| invalid("VNPAY_UTC_OFFSET_HOURS", "out of range"))?,
            default_ip: "127.0.0.1".into(),
        })
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("pay_url", &self.pay_url.as_str())
            .field("return_url", &self.return_url)
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<redacted>")
            .field("version", &self.version)
            .field("link_ttl", &self.link_ttl)
            .field("utc_offset", &self.utc_offset)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub gateway: GatewayConfig,
    pub conversion: RateConversion,
    pub frontend_result_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
        where
            T::Err: fmt::Display,
        {
            raw.map_or(Ok(default), |v| v.parse().map_err(|e| invalid(key, e)))
        }

        let mut gateway = GatewayConfig::new(
            &require("VNPAY_PAY_URL")?,
            &require("VNPAY_RETURN_URL")?,
            &require("VNPAY_TMN_CODE")?,
            &require("VNPAY_HASH_SECRET")?,
        )?;
        if let Some(v) = get("VNPAY_VERSION") { gateway.version = v; }
        if let Some(v) = get("VNPAY_COMMAND") { gateway.command = v; }
        if let Some(v) = get("VNPAY_CURRENCY") { gateway.currency = v; }
        if let Some(v) = get("VNPAY_LOCALE") { gateway.locale = v; }
        if let Some(v) = get("VNPAY_ORDER_TYPE") { gateway.order_type = v; }
        if let Some(v) = get("VNPAY_DEFAULT_IP") { gateway.default_ip = v; }

        let ttl_minutes: i64 = parse("VNPAY_LINK_TTL_MINUTES", get("VNPAY_LINK_TTL_MINUTES"), 15)?;
        if ttl_minutes <= 0 { return Err(invalid("VNPAY_LINK_TTL_MINUTES", "must be positive")); }
        gateway.link_ttl = Duration::minutes(ttl_minutes);

        let offset_hours: i32 = parse("VNPAY_UTC_OFFSET_HOURS", get("VNPAY_UTC_OFFSET_HOURS"), 7)?;
        gateway.utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| invalid("VNPAY_UTC_OFFSET_HOURS", "out of range"))?;

        let rate: Decimal = parse("GATEWAY_FX_RATE", get("GATEWAY_FX_RATE"), Decimal::ONE)?;
        let increment: i64 = parse("GATEWAY_ROUND_INCREMENT", get("GATEWAY_ROUND_INCREMENT"), 1)?;
        let conversion = RateConversion::new(rate, increment)
            .ok_or_else(|| invalid("GATEWAY_FX_RATE", "rate and increment must be positive"))?;

        let frontend = get("FRONTEND_PAYMENT_RESULT_URL").unwrap_or_else(|| DEFAULT_FRONTEND_RESULT_URL.to_string());
        let frontend_result_url = Url::parse(&frontend).map_err(|e| invalid("FRONTEND_PAYMENT_RESULT_URL", e))?;

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            port: parse("PORT", get("PORT"), DEFAULT_PORT)?,
            nats_url: get("NATS_URL"),
            gateway,
            conversion,
            frontend_result_url,
        })
    }
}
