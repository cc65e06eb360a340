//! Issuer verification client
//!
//! Posts `asset_id` (and optionally the issuer's JSON proof) as a form to
//! the verifier endpoint.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{DigiAssetsError, Result};

pub struct IssuerVerifier {
    url: String,
    http: reqwest::Client,
}

impl IssuerVerifier {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Verification record for `asset_id`
    ///
    /// A 204 answer is `DigiAssetsError::NoContent`; any status other than
    /// 200 is a verification error carrying the response body.
    pub async fn verify(&self, asset_id: &str, json: Option<&Value>) -> Result<Value> {
        let mut form = vec![("asset_id", asset_id.to_string())];
        if let Some(json) = json {
            form.push(("json", serde_json::to_string(json)?));
        }

        log::debug!("Verifying issuer of {}", asset_id);
        let response = self.http.post(&self.url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => parse_body(&body),
            StatusCode::NO_CONTENT => Err(DigiAssetsError::NoContent),
            _ => {
                log::warn!("Verifier answered {} for {}", status, asset_id);
                Err(DigiAssetsError::Verification(body))
            }
        }
    }
}

/// JSON body; a JSON string holding a document is decoded once more
fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(body)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner).unwrap_or(Value::String(inner))),
        value => Ok(value),
    }
}
