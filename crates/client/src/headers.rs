//! Parsing for the `--headers k=v,k=v,...` flag.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderParseError {
    #[error("header {0:?} is missing the = separator")]
    MissingSeparator(String),
    #[error("invalid header name {0:?}")]
    Name(String),
    #[error("invalid value for header {0:?}")]
    Value(String),
}

/// Split on comma, then on the first `=`. There is no escaping, so values
/// containing `,` or `=` cannot be expressed; a known limitation of the
/// flag format.
pub fn parse_extra_headers(spec: &str) -> Result<HeaderMap, HeaderParseError> {
    let mut headers = HeaderMap::new();
    if spec.is_empty() {
        return Ok(headers);
    }
    for pair in spec.split(',') {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| HeaderParseError::MissingSeparator(pair.to_string()))?;
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HeaderParseError::Name(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HeaderParseError::Value(name.to_string()))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
