//! CSRF crumb retrieval
//!
//! Coordinators with CSRF protection reject mutating calls that lack a
//! fresh crumb header. Older coordinators have no crumb issuer at all, so a
//! failed fetch only means "send without a crumb".

use reqwest::{StatusCode, Url};

use sl_core::Crumb;

use crate::http::HttpContext;

/// Crumb issuer endpoint
pub const CRUMB_PATH: &str = "crumbIssuer/api/xml";

/// Expression that makes the issuer answer with `field:value`
const CRUMB_XPATH: &str = r#"concat(//crumbRequestField,":",//crumb)"#;

/// Fetch a fresh crumb, or `None` if the coordinator does not issue one
pub async fn fetch_crumb(http: &HttpContext, base: &Url) -> Option<Crumb> {
    let url = match base.join(CRUMB_PATH) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Cannot build crumb URL from {}: {}", base, e);
            return None;
        }
    };

    let response = match http.get(url).query(&[("xpath", CRUMB_XPATH)]).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Crumb request failed: {}", e);
            return None;
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        tracing::debug!("No crumb issued (HTTP {})", status.as_u16());
        return None;
    }

    match response.text().await {
        Ok(body) => {
            let crumb = Crumb::parse(&body);
            if crumb.is_none() {
                tracing::debug!("Ignoring malformed crumb response");
            }
            crumb
        }
        Err(e) => {
            tracing::debug!("Failed to read crumb response: {}", e);
            None
        }
    }
}
