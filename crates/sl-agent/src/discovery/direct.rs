//! Direct discovery against a configured coordinator URL

use reqwest::{StatusCode, Url};

use sl_core::error::ProtocolError;
use sl_core::Candidate;

use crate::http::HttpContext;
use crate::xml::element_text;

/// Status endpoint that hands out the swarm secret
pub const STATUS_PATH: &str = "plugin/swarm/slaveInfo";

/// Headers only a coordinator sends
pub const COORDINATOR_HEADERS: [&str; 2] = ["X-Jenkins", "X-Hudson"];

/// Probe the coordinator's status endpoint for its secret
pub async fn discover(http: &HttpContext, url: &Url) -> Result<Candidate, ProtocolError> {
    let status_url = join(url, STATUS_PATH)?;
    tracing::debug!("Probing coordinator status at {}", status_url);

    let response = http.get(status_url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if status != StatusCode::OK {
        return Err(ProtocolError::BadStatus {
            operation: "status probe",
            status: status.as_u16(),
            body,
        });
    }

    let secret = element_text(&body, "swarmSecret")
        .map_err(|e| ProtocolError::Malformed {
            operation: "status probe",
            reason: e.to_string(),
        })?
        .ok_or_else(|| ProtocolError::Malformed {
            operation: "status probe",
            reason: "no swarmSecret element".to_string(),
        })?;

    Ok(Candidate::new(url.clone(), secret))
}

/// Check that `url` answers like a coordinator.
///
/// A 403 means the coordinator wants credentials first.
pub async fn verify_coordinator(http: &HttpContext, url: &Url) -> Result<(), ProtocolError> {
    let response = http.get(url.clone()).send().await?;

    if response.status() == StatusCode::FORBIDDEN {
        return Err(ProtocolError::AuthenticationRequired {
            url: url.to_string(),
        });
    }

    let headers = response.headers();
    if !COORDINATOR_HEADERS.iter().any(|h| headers.contains_key(*h)) {
        return Err(ProtocolError::NotACoordinator {
            url: url.to_string(),
        });
    }

    tracing::debug!("{} identified itself as a coordinator", url);
    Ok(())
}

/// Resolve a coordinator-relative path
pub(crate) fn join(base: &Url, path: &str) -> Result<Url, ProtocolError> {
    base.join(path).map_err(|e| ProtocolError::Malformed {
        operation: "url",
        reason: format!("cannot join {} onto {}: {}", path, base, e),
    })
}
