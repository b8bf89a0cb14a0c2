//! Outbound call origination through the Twilio REST API.

use crate::config::TwilioSettings;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum TelephonyError {
    #[error("telephony request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telephony provider rejected the call ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("telephony provider response did not include a call sid")]
    MissingSid,
}

/// Asks a telephony provider to place a call.
#[async_trait]
pub trait CallTrigger: Send + Sync {
    /// Dials `to` and returns the provider's call identifier. Once answered,
    /// the provider fetches call-control instructions from `callback_url`.
    async fn trigger(&self, to: &str, callback_url: &str) -> Result<String, TelephonyError>;
}

#[derive(Deserialize)]
struct CallResource {
    sid: Option<String>,
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

/// `CallTrigger` backed by Twilio's `Calls` resource.
pub struct TwilioClient {
    http: reqwest::Client,
    settings: TwilioSettings,
}

impl TwilioClient {
    pub fn new(settings: TwilioSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }
}

#[async_trait]
impl CallTrigger for TwilioClient {
    async fn trigger(&self, to: &str, callback_url: &str) -> Result<String, TelephonyError> {
        let response = self
            .http
            .post(self.calls_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", to),
                ("From", self.settings.from_number.as_str()),
                ("Url", callback_url),
                ("Method", "POST"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TwilioErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());
            error!(%status, %message, "Twilio rejected call request");
            return Err(TelephonyError::Rejected { status, message });
        }

        let call_sid = response
            .json::<CallResource>()
            .await?
            .sid
            .ok_or(TelephonyError::MissingSid)?;
        info!(%call_sid, %to, "Outbound call initiated");
        Ok(call_sid)
    }
}
