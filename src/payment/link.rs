//! Signed payment-link construction.

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeMap;

use crate::config::GatewayConfig;
use crate::domain::aggregates::PaymentLinkRecord;
use crate::domain::value_objects::{to_gateway_minor_units, ExternalRef};
use crate::payment::checksum::{canonicalize, Checksum, SIGNATURE_FIELD};
use crate::{EcommerceError, Result};

/// `yyyyMMddHHmmss` in the gateway's local time zone.
pub const GATEWAY_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Clone, Debug)]
pub struct LinkRequest<'a> {
    pub order_id: i64,
    /// Amount already converted to the gateway currency, in major units.
    pub amount: i64,
    pub description: &'a str,
    pub client_ip: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentLink {
    pub url: String,
    pub external_ref: ExternalRef,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn record(&self) -> PaymentLinkRecord {
        PaymentLinkRecord { url: self.url.clone(), external_ref: self.external_ref.to_string(), expires_at: self.expires_at }
    }
}

#[derive(Clone, Debug)]
pub struct PaymentLinkBuilder {
    config: GatewayConfig,
    checksum: Checksum,
}

impl PaymentLinkBuilder {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let checksum = Checksum::new(&config.hash_secret)?;
        Ok(Self { config, checksum })
    }

    pub fn checksum(&self) -> &Checksum { &self.checksum }

    pub fn build(&self, req: &LinkRequest<'_>, now: DateTime<Utc>) -> Result<PaymentLink> {
        if req.amount <= 0 {
            return Err(EcommerceError::Gateway(format!("order {} has no payable amount", req.order_id)));
        }
        let amount_minor = to_gateway_minor_units(req.amount)
            .ok_or_else(|| EcommerceError::Gateway(format!("amount {} exceeds the gateway range", req.amount)))?;
        let external_ref = ExternalRef::issue(req.order_id, now);
        let expires_at = now + self.config.link_ttl;
        let client_ip = if req.client_ip.trim().is_empty() { self.config.default_ip.as_str() } else { req.client_ip.trim() };
        let return_url = format!("{}/{}", self.config.return_url.trim_end_matches('/'), req.order_id);

        let params = BTreeMap::from([
            ("vnp_Version", self.config.version.clone()),
            ("vnp_Command", self.config.command.clone()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", amount_minor.to_string()),
            ("vnp_CurrCode", self.config.currency.clone()),
            ("vnp_TxnRef", external_ref.to_string()),
            ("vnp_OrderInfo", req.description.to_string()),
            ("vnp_OrderType", self.config.order_type.clone()),
            ("vnp_Locale", self.config.locale.clone()),
            ("vnp_ReturnUrl", return_url),
            ("vnp_IpAddr", client_ip.to_string()),
            ("vnp_CreateDate", gateway_time(now, self.config.utc_offset)),
            ("vnp_ExpireDate", gateway_time(expires_at, self.config.utc_offset)),
        ]);

        let query = canonicalize(params.iter().map(|(k, v)| (*k, v.as_str())));
        let signature = self.checksum.sign(&query);
        let url = format!("{}?{}&{}={}", self.config.pay_url, query, SIGNATURE_FIELD, signature);

        tracing::debug!(order_id = req.order_id, external_ref = %external_ref, amount_minor, "built payment link");
        Ok(PaymentLink { url, external_ref, amount_minor, created_at: now, expires_at })
    }
}

fn gateway_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(GATEWAY_TIME_FORMAT).to_string()
}
