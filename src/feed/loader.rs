//! Page loader over HTTP

use super::params::FeedParams;
use crate::config::FeedConfig;
use crate::decode::{EnvelopeDecoder, JsonEnvelopeDecoder};
use crate::error::Result;
use crate::http::HttpClient;
use crate::pagination::PageLoader;
use crate::types::{Cursor, Envelope, StringMap};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Loads feed pages over HTTP and decodes them into envelopes
#[derive(Debug)]
pub struct HttpFeedLoader {
    name: String,
    base_url: Url,
    path: String,
    query: StringMap,
    client: HttpClient,
    decoder: JsonEnvelopeDecoder,
}

impl HttpFeedLoader {
    /// Create a loader from a validated feed config
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let client = HttpClient::with_config(config.client_config())?;
        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url()?,
            path: config.path.clone(),
            query: config.query.clone(),
            client,
            decoder: JsonEnvelopeDecoder::from_config(config.decoder_config()),
        })
    }

    /// Feed name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL of page 1 for the given params
    pub fn first_page_url(&self, params: &FeedParams) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let mut url = if path.is_empty() {
            self.base_url.clone()
        } else {
            Url::parse(&format!("{base}/{path}"))?
        };

        let query = params.merged_over(&self.query);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }
        Ok(url)
    }

    /// URL a cursor points at: absolute cursors verbatim, others joined to the base
    pub fn cursor_url(&self, cursor: &Cursor) -> Result<Url> {
        match Url::parse(cursor.as_str()) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(self.base_url.join(cursor.as_str())?),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, url: Url) -> Result<Envelope<Value>> {
        let response = self.client.get(&url).await?;
        let envelope = self.decoder.decode(&response.body, &response.headers)?;
        debug!(
            "Feed '{}': {} items from {} (more: {})",
            self.name,
            envelope.items.len(),
            url,
            envelope.has_more()
        );
        Ok(envelope)
    }
}

#[async_trait]
impl PageLoader<FeedParams, Envelope<Value>> for HttpFeedLoader {
    async fn load_by_params(&self, params: FeedParams) -> Result<Envelope<Value>> {
        let url = self.first_page_url(&params)?;
        self.fetch(url).await
    }

    async fn load_by_cursor(&self, cursor: Cursor) -> Result<Envelope<Value>> {
        let url = self.cursor_url(&cursor)?;
        self.fetch(url).await
    }
}
