use crate::constants::{STS_API_VERSION, X_AMZN_REQUESTID, X_AMZ_CONTENT_SHA_256};
use crate::Credential;
use bytes::Bytes;
use http::StatusCode;
use log::{debug, error};
use quick_xml::de;
use serde::Deserialize;
use sigv4_bridge_core::hash::EMPTY_STRING_SHA256;
use sigv4_bridge_core::utils::Redact;
use sigv4_bridge_core::{Context, Error, ErrorKind, Result, Signer};
use std::fmt::{Debug, Formatter};

/// Build the regional STS endpoint for the given region.
///
/// China regions live under `amazonaws.com.cn`.
pub fn sts_endpoint(region: &str) -> String {
    if region.starts_with("cn-") {
        format!("https://sts.{region}.amazonaws.com.cn")
    } else {
        format!("https://sts.{region}.amazonaws.com")
    }
}

/// Parameters of one `AssumeRole` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleInput {
    /// ARN of the role to assume.
    pub role_arn: String,
    /// Session name recorded by STS for auditing.
    pub role_session_name: String,
    /// Requested lifetime of the temporary credentials.
    pub duration_seconds: u32,
}

/// Decoded `AssumeRole` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumeRoleOutput {
    /// `None` when STS answered without a `Credentials` element.
    pub credentials: Option<StsCredentials>,
    /// Request id reported by STS, if any.
    pub request_id: Option<String>,
}

/// Temporary credentials as returned by STS.
#[derive(Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct StsCredentials {
    /// Temporary access key id.
    pub access_key_id: String,
    /// Temporary secret access key.
    pub secret_access_key: String,
    /// Session token bound to the temporary key pair.
    pub session_token: String,
    /// RFC 3339 expiration timestamp.
    pub expiration: String,
}

impl Debug for StsCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsCredentials")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// StsClient talks to the AWS Security Token Service.
///
/// Calls are signed through `signer`, which carries the base identity allowed to assume roles.
#[derive(Debug, Clone)]
pub struct StsClient {
    endpoint: String,
    signer: Signer<Credential>,
}

impl StsClient {
    /// Create a client for the regional endpoint of `region`.
    ///
    /// `signer` should be scoped to the `sts` service in the same region.
    pub fn new(region: &str, signer: Signer<Credential>) -> Self {
        Self {
            endpoint: sts_endpoint(region),
            signer,
        }
    }

    /// Override the endpoint, e.g. for a VPC endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `AssumeRole`.
    ///
    /// Every failure, including signing the call and failing to reach STS, is reported as
    /// [`ErrorKind::CredentialExchange`]. Nothing is retried.
    pub async fn assume_role(
        &self,
        ctx: &Context,
        input: &AssumeRoleInput,
    ) -> Result<AssumeRoleOutput> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRole")
            .append_pair("DurationSeconds", &input.duration_seconds.to_string())
            .append_pair("RoleArn", &input.role_arn)
            .append_pair("RoleSessionName", &input.role_session_name)
            .append_pair("Version", STS_API_VERSION)
            .finish();
        let url = format!("{}/?{query}", self.endpoint);

        let req = http::Request::get(&url)
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            // Set content sha to empty string.
            .header(X_AMZ_CONTENT_SHA_256, EMPTY_STRING_SHA256)
            .body(Bytes::new())
            .map_err(|e| {
                Error::credential_exchange("failed to build STS AssumeRole request")
                    .with_source(e)
                    .with_context(format!("endpoint: {}", self.endpoint))
            })?;

        let (mut parts, body) = req.into_parts();
        self.signer.sign(&mut parts).await.map_err(|e| {
            error!("failed to sign AssumeRole request for {}: {e}", input.role_arn);
            Error::credential_exchange("failed to sign STS AssumeRole request")
                .with_source(e)
                .with_context(format!("role_arn: {}", input.role_arn))
        })?;
        let req = http::Request::from_parts(parts, body);

        debug!("sending AssumeRole request to {}", self.endpoint);
        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            error!("failed to send AssumeRole request to {}: {e}", self.endpoint);
            Error::credential_exchange("failed to send AssumeRole request to STS")
                .with_source(e)
                .with_context(format!("role_arn: {}", input.role_arn))
                .with_context(format!("endpoint: {}", self.endpoint))
        })?;

        let status = resp.status();
        let request_id = resp
            .headers()
            .get(X_AMZN_REQUESTID)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content = resp.into_body();

        if status != StatusCode::OK {
            let err = parse_sts_error("AssumeRole", status, &content, request_id.as_deref())
                .with_context(format!("role_arn: {}", input.role_arn))
                .with_context(format!("session_name: {}", input.role_session_name));
            error!("{err}: {:?}", err.context());
            return Err(err);
        }

        let resp: AssumeRoleResponse = de::from_str(&content).map_err(|e| {
            error!("failed to parse AssumeRole response: {e}");
            Error::credential_exchange("failed to parse STS AssumeRole response")
                .with_source(e)
                .with_context(format!("response_length: {}", content.len()))
                .with_context(format!("role_arn: {}", input.role_arn))
        })?;

        Ok(AssumeRoleOutput {
            credentials: resp.result.credentials,
            request_id: request_id.or(resp.metadata.request_id),
        })
    }
}

/// Turn an STS error document into a [`ErrorKind::CredentialExchange`] error.
///
/// Bodies that are not a valid error document keep the raw body as context.
fn parse_sts_error(
    operation: &str,
    status: StatusCode,
    body: &str,
    request_id: Option<&str>,
) -> Error {
    let (mut err, body_request_id) = match de::from_str::<StsErrorResponse>(body) {
        Ok(resp) if !resp.error.code.is_empty() => {
            let detail = resp.error;
            let mut err = Error::new(
                ErrorKind::CredentialExchange,
                format!("STS {operation} failed: {}: {}", detail.code, detail.message),
            )
            .with_context(format!("code: {}", detail.code))
            .with_context(format!("message: {}", detail.message));
            if !detail.kind.is_empty() {
                err = err.with_context(format!("type: {}", detail.kind));
            }
            (err, resp.request_id)
        }
        _ => (
            Error::credential_exchange(format!("STS {operation} failed with status {status}"))
                .with_context(format!("body: {body}")),
            None,
        ),
    };

    err = err.with_context(format!("status: {status}"));
    if let Some(id) = request_id.map(|v| v.to_string()).or(body_request_id) {
        err = err.with_context(format!("request_id: {id}"));
    }
    err
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleResult")]
    result: AssumeRoleResult,
    #[serde(rename = "ResponseMetadata")]
    metadata: ResponseMetadata,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResult {
    credentials: Option<StsCredentials>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ResponseMetadata {
    request_id: Option<String>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorResponse {
    error: StsErrorDetail,
    request_id: Option<String>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorDetail {
    #[serde(rename = "Type")]
    kind: String,
    code: String,
    message: String,
}
