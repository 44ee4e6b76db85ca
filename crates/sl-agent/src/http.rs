//! Shared HTTP client and transport trust policy
//!
//! One connection-pooled `reqwest::Client` is built at startup and passed
//! to every component that talks to the coordinator. The trust policy
//! decides how server certificates are checked:
//!
//! - no fingerprints: the system trust store
//! - fingerprints: the end-entity certificate's SHA-256 must be listed
//! - verification disabled: anything goes

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};

use sl_core::config::NodeConfig;
use sl_core::error::ConfigError;

/// Certificate trust policy for coordinator connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustConfig {
    /// Lower-case, colon-free SHA-256 hex digests; empty means system trust
    pub fingerprints: BTreeSet<String>,
    /// Skip certificate verification entirely
    pub accept_any: bool,
}

impl TrustConfig {
    /// Build an allow-list from user-supplied fingerprints.
    ///
    /// Accepts `AB:CD:...` and plain hex in any case.
    pub fn from_fingerprints<S: AsRef<str>>(fingerprints: &[S]) -> Result<Self, ConfigError> {
        let mut normalized = BTreeSet::new();
        for raw in fingerprints {
            let fp: String = raw
                .as_ref()
                .trim()
                .chars()
                .filter(|c| *c != ':')
                .collect::<String>()
                .to_ascii_lowercase();
            if fp.len() != 64 || !fp.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is not a SHA-256 certificate fingerprint",
                    raw.as_ref()
                )));
            }
            normalized.insert(fp);
        }
        Ok(Self {
            fingerprints: normalized,
            accept_any: false,
        })
    }

    /// Trust policy described by the node configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self, ConfigError> {
        if config.disable_ssl_verification {
            return Ok(Self {
                fingerprints: BTreeSet::new(),
                accept_any: true,
            });
        }
        Self::from_fingerprints(&config.ssl_fingerprints)
    }

    /// Whether the system trust store applies
    pub fn uses_system_store(&self) -> bool {
        !self.accept_any && self.fingerprints.is_empty()
    }
}

/// Basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials from the node configuration, if both parts are set
    pub fn from_config(config: &NodeConfig) -> Option<Self> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Self {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// HTTP client shared by discovery, registration and the label watcher
#[derive(Debug, Clone)]
pub struct HttpContext {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpContext {
    /// Build the shared client
    pub fn new(
        trust: &TrustConfig,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sl-agent/", env!("CARGO_PKG_VERSION")));

        if trust.accept_any {
            tracing::warn!("Certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        } else if !trust.fingerprints.is_empty() {
            tracing::info!(
                "Pinning coordinator certificate to {} fingerprint(s)",
                trust.fingerprints.len()
            );
            builder = builder.use_preconfigured_tls(pinned_tls_config(trust)?);
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Whether requests carry credentials
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Start a GET request
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.client.get(url))
    }

    /// Start a POST request
    pub fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.client.post(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }
}

fn pinned_tls_config(trust: &TrustConfig) -> Result<rustls::ClientConfig, ConfigError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = FingerprintVerifier {
        fingerprints: trust.fingerprints.clone(),
        algorithms: provider.signature_verification_algorithms,
    };

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Invalid(format!("TLS setup failed: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

/// SHA-256 fingerprint of a DER certificate, lower-case hex
pub fn certificate_fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Accepts exactly the certificates on the allow-list
#[derive(Debug)]
struct FingerprintVerifier {
    fingerprints: BTreeSet<String>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let fingerprint = certificate_fingerprint(end_entity.as_ref());
        if self.fingerprints.contains(&fingerprint) {
            tracing::debug!("Server certificate matches pinned fingerprint");
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!("Server certificate {} is not in the allow-list", fingerprint);
            Err(rustls::Error::General(format!(
                "certificate fingerprint {} is not trusted",
                fingerprint
            )))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
