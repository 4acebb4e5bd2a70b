// File: crates/slotwise_gcal/src/auth.rs
use google_calendar3::{
    hyper_rustls::{self, HttpsConnectorBuilder},
    hyper_util::client::legacy::connect::HttpConnector,
    hyper_util::client::legacy::Client,
    yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator},
    CalendarHub,
};
use slotwise_config::GcalConfig;
use std::path::Path;
use thiserror::Error;

// Type aliases for clarity
type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

pub type HubType = CalendarHub<Connector>;

#[derive(Error, Debug)]
pub enum GcalAuthError {
    #[error("Missing key_path in GcalConfig")]
    MissingKeyPath,
    #[error("Failed to read service account key: {0}")]
    KeyRead(#[from] std::io::Error),
    #[error("Failed to set up TLS roots: {0}")]
    Tls(String),
}

pub async fn create_calendar_hub(config: &GcalConfig) -> Result<HubType, GcalAuthError> {
    let key_path = config
        .key_path
        .as_deref()
        .filter(|p| *p != "secret_from_env")
        .ok_or(GcalAuthError::MissingKeyPath)?;

    let sa_key = read_service_account_key(Path::new(key_path)).await?;

    let auth = ServiceAccountAuthenticator::builder(sa_key).build().await?;

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| GcalAuthError::Tls(e.to_string()))?
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(https);

    Ok(CalendarHub::new(client, auth))
}
