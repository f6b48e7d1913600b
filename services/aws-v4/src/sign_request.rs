use crate::constants::{
    AWS4_HMAC_SHA256, AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, UNSIGNED_PAYLOAD,
    X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::Credential;
use async_trait::async_trait;
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::utf8_percent_encode;
use sigv4_bridge_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use sigv4_bridge_core::time::{format_date, format_iso8601, now, DateTime};
use sigv4_bridge_core::{Context, Error, Result, SignRequest, SigningRequest};
use std::fmt::Write;

/// RequestSigner that implement AWS SigV4 with the signature in the `authorization` header.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for the given service scope and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// The region this signer derives its signing key for.
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let cred = check_credential(credential)?;
        let now = self.time.unwrap_or_else(now);
        let mut signed_req = SigningRequest::build(req)?;

        // canonicalize context
        canonicalize_header(&mut signed_req, cred, now)?;
        canonicalize_query(&mut signed_req);

        // build canonical request and string to sign.
        let creq = canonical_request_string(&signed_req)?;
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "{AWS4_HMAC_SHA256}")?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", &encoded_req)?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "{AWS4_HMAC_SHA256} Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_req.header_name_to_vec_sorted().join(";"),
            signature
        ))
        .map_err(|e| Error::signing("failed to create authorization header").with_source(e))?;
        authorization.set_sensitive(true);

        signed_req
            .headers
            .insert(header::AUTHORIZATION, authorization);

        // Apply to the request.
        signed_req.apply(req)
    }
}

fn check_credential(credential: Option<&Credential>) -> Result<&Credential> {
    let Some(cred) = credential else {
        return Err(Error::signing("no credential available to sign request"));
    };
    if cred.access_key_id.is_empty() {
        return Err(Error::signing("credential has no access key id"));
    }
    if cred.secret_access_key.is_empty() {
        return Err(Error::signing("credential has no secret access key"));
    }
    if cred.is_expired() {
        return Err(Error::signing("credential is expired")
            .with_context(format!("expires_in: {:?}", cred.expires_in)));
    }
    Ok(cred)
}

fn canonical_request_string(ctx: &SigningRequest) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)?;
    // Insert encoded path. The path is already escaped once, so `%` turns into `%25` here.
    writeln!(f, "{}", utf8_percent_encode(&ctx.path, &AWS_URI_ENCODE_SET))?;
    // Insert query
    writeln!(
        f,
        "{}",
        ctx.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    )?;
    // Insert signed headers, normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
    let signed_headers = ctx.header_name_to_vec_sorted();
    for header in signed_headers.iter() {
        let values = ctx
            .headers
            .get_all(*header)
            .iter()
            .map(SigningRequest::header_value_normalize)
            .collect::<Result<Vec<_>>>()?;
        writeln!(f, "{}:{}", header, values.join(","))?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;

    match ctx.headers.get(X_AMZ_CONTENT_SHA_256) {
        Some(v) => write!(f, "{}", v.to_str()?)?,
        None => write!(f, "{UNSIGNED_PAYLOAD}")?,
    }

    Ok(f)
}

fn canonicalize_header(ctx: &mut SigningRequest, cred: &Credential, now: DateTime) -> Result<()> {
    // Insert HOST header if not present.
    if ctx.headers.get(header::HOST).is_none() {
        ctx.headers
            .insert(header::HOST, HeaderValue::from_str(ctx.authority.as_str())?);
    }

    // Always overwrite the date so that a re-signed request carries the new timestamp.
    ctx.headers
        .insert(X_AMZ_DATE, HeaderValue::from_str(&format_iso8601(now))?);

    // Insert X_AMZ_CONTENT_SHA_256 header if not present.
    if ctx.headers.get(X_AMZ_CONTENT_SHA_256).is_none() {
        ctx.headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::from_static(UNSIGNED_PAYLOAD),
        );
    }

    // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
    match cred.session_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let mut value = HeaderValue::from_str(token).map_err(|e| {
                Error::signing("session token is not a valid header value").with_source(e)
            })?;
            // Set token value sensitive to valid leaking.
            value.set_sensitive(true);

            ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
        }
        None => {
            ctx.headers.remove(X_AMZ_SECURITY_TOKEN);
        }
    }

    Ok(())
}

fn canonicalize_query(ctx: &mut SigningRequest) {
    // Return if query is empty.
    if ctx.query.is_empty() {
        return;
    }

    // Sort by param name
    ctx.query.sort();

    ctx.query = ctx
        .query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use anyhow::Result;
    use aws_credential_types::Credentials;
    use aws_sigv4::http_request::PayloadChecksumKind;
    use aws_sigv4::http_request::PercentEncodingMode;
    use aws_sigv4::http_request::SignableBody;
    use aws_sigv4::http_request::SignableRequest;
    use aws_sigv4::http_request::SigningSettings;
    use aws_sigv4::sign::v4;
    use chrono::TimeZone;
    use http::Request;
    use pretty_assertions::assert_eq;

    /// (name, request_builder)
    type TestCase = (&'static str, fn() -> Request<&'static str>);

    fn test_cases() -> Vec<TestCase> {
        vec![
            ("get_request", test_get_request),
            ("get_request_with_query", test_get_request_with_query),
            ("get_request_with_arn_query", test_get_request_with_arn_query),
            ("post_request_with_body_digest", test_post_request_with_body_digest),
            ("get_request_with_escaped_path", test_get_request_with_escaped_path),
            ("get_request_with_inner_spaces", test_get_request_with_inner_spaces),
            ("get_request_with_repeated_header", test_get_request_with_repeated_header),
        ]
    }

    fn test_get_request() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://api.example.com/data"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_get_request_with_query() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://api.example.com/prod/items?limit=10&after=item-3&filter=a/b"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_get_request_with_arn_query() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://sts.us-east-1.amazonaws.com/?Action=AssumeRole&DurationSeconds=3600&RoleArn=arn%3Aaws%3Aiam%3A%3A111111111111%3Arole%2Ftarget&RoleSessionName=sigv4-bridge&Version=2011-06-15"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_post_request_with_body_digest() -> Request<&'static str> {
        let content = r#"{"hello":"world"}"#;
        let mut req = Request::new(content);
        *req.method_mut() = http::Method::POST;
        *req.uri_mut() = "https://api.example.com/data"
            .parse()
            .expect("url must be valid");

        req.headers_mut().insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&content.len().to_string()).expect("must be valid"),
        );
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        req.headers_mut().insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::from_str(&hex_sha256(content.as_bytes())).expect("must be valid"),
        );

        req
    }

    fn test_get_request_with_escaped_path() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://api.example.com/prod/a%20b/c%2Fd"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_get_request_with_inner_spaces() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://api.example.com/data"
            .parse()
            .expect("url must be valid");

        req.headers_mut().insert(
            "x-api-note",
            HeaderValue::from_static("  first   second  third "),
        );

        req
    }

    fn test_get_request_with_repeated_header() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://api.example.com/data"
            .parse()
            .expect("url must be valid");

        req.headers_mut()
            .append("x-api-tags", HeaderValue::from_static("blue"));
        req.headers_mut()
            .append("x-api-tags", HeaderValue::from_static(" green  house"));

        req
    }

    #[track_caller]
    fn compare_request(name: &str, l: &Request<&str>, r: &Request<&str>) {
        fn format_headers(req: &Request<&str>) -> Vec<String> {
            let mut hs = req
                .headers()
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v.to_str().expect("must be valid")))
                .collect::<Vec<_>>();

            // Insert host if original request doesn't have it.
            let authority = req.uri().authority().expect("must have authority");
            if !hs.contains(&format!("host:{authority}")) {
                hs.push(format!("host:{authority}"))
            }

            hs.sort();
            hs
        }

        assert_eq!(
            format_headers(l),
            format_headers(r),
            "{name} header mismatch"
        );
    }

    fn expected_request(
        req_fn: fn() -> Request<&'static str>,
        token: Option<&str>,
        now: DateTime,
    ) -> Result<Request<&'static str>> {
        let mut req = req_fn();

        let mut ss = SigningSettings::default();
        ss.percent_encoding_mode = PercentEncodingMode::Double;
        ss.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let id = Credentials::new(
            "access_key_id",
            "secret_access_key",
            token.map(|v| v.to_string()),
            None,
            "hardcoded-credentials",
        )
        .into();
        let sp = v4::SigningParams::builder()
            .identity(&id)
            .region("test")
            .name("execute-api")
            .time(SystemTime::from(now))
            .settings(ss)
            .build()?;

        let mut body = SignableBody::UnsignedPayload;
        if req.headers().get(X_AMZ_CONTENT_SHA_256).is_some() {
            body = SignableBody::Bytes(req.body().as_bytes());
        }

        let output = aws_sigv4::http_request::sign(
            SignableRequest::new(
                req.method().as_str(),
                req.uri().to_string(),
                req.headers()
                    .iter()
                    .map(|(k, v)| (k.as_str(), std::str::from_utf8(v.as_bytes()).unwrap())),
                body,
            )?,
            &sp.into(),
        )?;
        let (aws_sig, _) = output.into_parts();
        aws_sig.apply_to_request_http1x(&mut req);
        Ok(req)
    }

    async fn actual_request(
        req_fn: fn() -> Request<&'static str>,
        token: Option<&str>,
        now: DateTime,
    ) -> Result<Request<&'static str>> {
        let (mut parts, body) = req_fn().into_parts();

        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: token.map(|v| v.to_string()),
            expires_in: None,
        };

        RequestSigner::new("execute-api", "test")
            .with_time(now)
            .sign_request(&Context::new(), &mut parts, Some(&cred))
            .await?;

        Ok(Request::from_parts(parts, body))
    }

    #[tokio::test]
    async fn test_matches_aws_sigv4() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        for (name, req_fn) in test_cases() {
            for token in [None, Some("security_token")] {
                let now = now();
                let expected = expected_request(req_fn, token, now)?;
                let actual = actual_request(req_fn, token, now).await?;
                compare_request(&format!("{name} with token {token:?}"), &expected, &actual);
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() -> Result<()> {
        let time = chrono::Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .expect("time must be valid");

        let first = actual_request(test_get_request, None, time).await?;
        let second = actual_request(test_get_request, None, time).await?;

        let auth = first.headers()[header::AUTHORIZATION].to_str()?;
        assert_eq!(auth, second.headers()[header::AUTHORIZATION].to_str()?);
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=access_key_id/20240102/test/execute-api/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        assert_eq!(first.headers()[X_AMZ_DATE], "20240102T030405Z");
        assert!(first.headers().get(X_AMZ_SECURITY_TOKEN).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_token_header() -> Result<()> {
        let req = actual_request(test_get_request, Some("tok"), now()).await?;

        assert_eq!(req.headers()[X_AMZ_SECURITY_TOKEN], "tok");
        assert!(req.headers()[X_AMZ_SECURITY_TOKEN].is_sensitive());
        assert!(req.headers()[header::AUTHORIZATION]
            .to_str()?
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"));
        Ok(())
    }

    #[test]
    fn test_canonical_request_string() -> Result<()> {
        let (mut parts, _) = test_get_request_with_repeated_header().into_parts();
        parts.uri = "https://api.example.com/prod/a%20b".parse()?;
        parts
            .headers
            .insert("x-api-note", HeaderValue::from_static(" one   two "));

        let ctx = SigningRequest::build(&mut parts)?;
        let creq = canonical_request_string(&ctx)?;
        let lines = creq.lines().collect::<Vec<_>>();

        assert_eq!(lines[1], "/prod/a%2520b");
        assert_eq!(lines[3], "x-api-note:one two");
        assert_eq!(lines[4], "x-api-tags:blue,green house");
        Ok(())
    }

    #[tokio::test]
    async fn test_sent_header_values_are_kept() -> Result<()> {
        let req = actual_request(test_get_request_with_repeated_header, None, now()).await?;

        let tags = req
            .headers()
            .get_all("x-api-tags")
            .iter()
            .map(|v| v.to_str())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        assert_eq!(tags, vec!["blue", " green  house"]);
        assert!(req.headers()[header::AUTHORIZATION]
            .to_str()?
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-api-tags"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_missing_credential_fields() {
        let signer = RequestSigner::new("execute-api", "us-east-1");
        let cases = [
            None,
            Some(Credential::default()),
            Some(Credential {
                access_key_id: "AKIAX".to_string(),
                ..Default::default()
            }),
            Some(Credential {
                access_key_id: "AKIAX".to_string(),
                secret_access_key: "secX".to_string(),
                session_token: Some("tok".to_string()),
                expires_in: Some(now() - chrono::TimeDelta::hours(1)),
            }),
        ];

        for cred in cases {
            let (mut parts, _) = test_get_request().into_parts();
            let err = signer
                .sign_request(&Context::new(), &mut parts, cred.as_ref())
                .await
                .expect_err("signing must fail");
            assert!(err.is_signing(), "{cred:?} must fail with signing error");
            assert!(parts.headers.get(header::AUTHORIZATION).is_none());
        }
    }
}
