use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

use crate::error::HarvestError;

/// Foreign-protocol marker: the conversion service signals failure by
/// prefixing its payload instead of using a status code.
const ERROR_PREFIX: &str = "ERROR:";

/// XML-to-JSON conversion service. `Ok` carries the raw service payload,
/// which still follows the foreign error-marker protocol; callers go
/// through [`decode_payload`] and never inspect prefixes themselves.
pub trait XmlConverter: Send + Sync {
    fn convert(&self, raw_xml: &str) -> Result<String, HarvestError>;
}

/// Wrap the service's string-prefix protocol into a proper result: an
/// `ERROR:`-prefixed or empty payload is a rejection, anything else must
/// parse as a JSON document.
pub fn decode_payload(payload: &str, source: &Utf8Path) -> Result<Value, HarvestError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::ConversionRejected {
            source_file: source.to_string(),
            message: "empty payload".to_string(),
        });
    }
    if let Some(message) = trimmed.strip_prefix(ERROR_PREFIX) {
        return Err(HarvestError::ConversionRejected {
            source_file: source.to_string(),
            message: message.trim().to_string(),
        });
    }
    serde_json::from_str(trimmed).map_err(|err| HarvestError::MalformedDocument(err.to_string()))
}

pub struct HttpXmlConverter {
    client: Client,
    service_url: String,
}

impl HttpXmlConverter {
    pub fn new(service_url: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dbgap-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::ConverterHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| HarvestError::ConverterHttp(err.to_string()))?;
        Ok(Self {
            client,
            service_url: service_url.to_string(),
        })
    }
}

impl XmlConverter for HttpXmlConverter {
    fn convert(&self, raw_xml: &str) -> Result<String, HarvestError> {
        let response = self
            .client
            .post(&self.service_url)
            .header(CONTENT_TYPE, "application/xml")
            .body(raw_xml.to_string())
            .send()
            .map_err(|err| HarvestError::ConverterHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "conversion request failed".to_string());
            return Err(HarvestError::ConverterStatus { status, message });
        }
        response
            .text()
            .map_err(|err| HarvestError::ConverterHttp(err.to_string()))
    }
}
