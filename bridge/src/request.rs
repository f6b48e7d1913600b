use crate::Config;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use sigv4_bridge_aws_v4::X_AMZ_CONTENT_SHA_256;
use sigv4_bridge_core::hash::hex_sha256;
use sigv4_bridge_core::Result;

/// The request to sign and send.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Absolute target url.
    pub url: Uri,
    /// HTTP method.
    pub method: Method,
    /// Extra headers, signed along with the ones added by the signer.
    pub headers: HeaderMap,
    /// Payload.
    pub body: Bytes,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers and an empty body.
    pub fn new(method: Method, url: Uri) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Build the descriptor for the target of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.target_method()?, config.target_uri()?))
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Turn into an unsigned request that carries the hash of its body.
    pub fn into_request(self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method)
            .uri(self.url)
            .body(Bytes::new())?;

        let mut headers = self.headers;
        headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::from_str(&hex_sha256(&self.body))?,
        );
        *req.headers_mut() = headers;
        *req.body_mut() = self.body;

        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigv4_bridge_core::hash::EMPTY_STRING_SHA256;

    #[test]
    fn test_into_request_hashes_body() -> Result<()> {
        let req = RequestDescriptor::new(Method::POST, "https://api.example.com/data".parse()?)
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .with_body(r#"{"hello":"world"}"#)
            .into_request()?;

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), "https://api.example.com/data");
        assert_eq!(req.headers()[http::header::CONTENT_TYPE], "application/json");
        assert_eq!(
            req.headers()[X_AMZ_CONTENT_SHA_256],
            hex_sha256(br#"{"hello":"world"}"#)
        );
        assert_eq!(req.body().as_ref(), br#"{"hello":"world"}"#);
        Ok(())
    }

    #[test]
    fn test_from_config_defaults_to_empty_get() -> Result<()> {
        let config = Config {
            url: "https://api.example.com/data".to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        };

        let req = RequestDescriptor::from_config(&config)?.into_request()?;
        assert_eq!(req.method(), Method::GET);
        assert!(req.body().is_empty());
        assert_eq!(req.headers()[X_AMZ_CONTENT_SHA_256], EMPTY_STRING_SHA256);
        Ok(())
    }
}
