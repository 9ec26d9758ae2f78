//! Upstream sources and the fetcher abstraction over them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use epitrack_core::{DataType, IngestError};

const JHU_BASE: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";
const LIVE_FEED: &str =
    "https://api.apify.com/v2/key-value-stores/SmuuI0oebnTWjRTUh/records/LATEST?disableRedirect=true";

/// A named upstream document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub name: String,
    pub url: String,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Every upstream document one ingestion pass reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub confirmed_global: Source,
    pub deaths_global: Source,
    pub recovered_global: Source,
    pub confirmed_us: Source,
    pub deaths_us: Source,
    pub live_feed: Source,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let jhu = |file: &str| format!("{}/{}", JHU_BASE, file);
        Self {
            confirmed_global: Source::new(
                "confirmed_global",
                jhu("time_series_covid19_confirmed_global.csv"),
            ),
            deaths_global: Source::new("deaths_global", jhu("time_series_covid19_deaths_global.csv")),
            recovered_global: Source::new(
                "recovered_global",
                jhu("time_series_covid19_recovered_global.csv"),
            ),
            confirmed_us: Source::new("confirmed_us", jhu("time_series_covid19_confirmed_US.csv")),
            deaths_us: Source::new("deaths_us", jhu("time_series_covid19_deaths_US.csv")),
            live_feed: Source::new("live_feed", LIVE_FEED),
            timeout: Duration::from_secs(60),
        }
    }
}

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global time-series source for a dataset.
    pub fn global(&self, data_type: DataType) -> &Source {
        match data_type {
            DataType::Confirmed => &self.confirmed_global,
            DataType::Deaths => &self.deaths_global,
            DataType::Recovered => &self.recovered_global,
        }
    }

    /// US county source for a dataset, if upstream publishes one.
    pub fn us(&self, data_type: DataType) -> Option<&Source> {
        match data_type {
            DataType::Confirmed => Some(&self.confirmed_us),
            DataType::Deaths => Some(&self.deaths_us),
            DataType::Recovered => None,
        }
    }

    pub fn with_global(mut self, data_type: DataType, url: impl Into<String>) -> Self {
        let source = match data_type {
            DataType::Confirmed => &mut self.confirmed_global,
            DataType::Deaths => &mut self.deaths_global,
            DataType::Recovered => &mut self.recovered_global,
        };
        source.url = url.into();
        self
    }

    pub fn with_us(mut self, data_type: DataType, url: impl Into<String>) -> Self {
        match data_type {
            DataType::Confirmed => self.confirmed_us.url = url.into(),
            DataType::Deaths => self.deaths_us.url = url.into(),
            DataType::Recovered => {}
        }
        self
    }

    pub fn with_live_feed(mut self, url: impl Into<String>) -> Self {
        self.live_feed.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Retrieves the raw bytes of an upstream document.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, IngestError>;
}

/// Fetches sources over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("epitrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Fetch {
                source_name: "http-client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, IngestError> {
        let fetch_error = |e: reqwest::Error| IngestError::Fetch {
            source_name: source.name.clone(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;
        let body = response.bytes().await.map_err(fetch_error)?;
        tracing::debug!(source = %source.name, bytes = body.len(), "Fetched source");
        Ok(body.to_vec())
    }
}

/// Serves documents from memory, keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, source_name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(source_name.into(), body.into());
        self
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, IngestError> {
        self.documents
            .get(&source.name)
            .cloned()
            .ok_or_else(|| IngestError::Fetch {
                source_name: source.name.clone(),
                reason: "no such document".to_string(),
            })
    }
}
