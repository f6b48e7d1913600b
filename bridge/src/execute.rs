use bytes::Bytes;
use log::debug;
use serde::{Deserialize, Serialize};
use sigv4_bridge_core::{Context, Result};

/// The upstream answer handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Upstream status code.
    pub status_code: u16,
    /// Upstream body, decoded lossily as utf-8.
    pub body: String,
}

/// Send a signed request.
///
/// Any status is a successful result. Only a failure to complete the exchange is an error,
/// and it is returned as is.
pub async fn execute(ctx: &Context, req: http::Request<Bytes>) -> Result<Response> {
    debug!("sending {} {}", req.method(), req.uri());
    let resp = ctx.http_send_as_string(req).await?;

    let status_code = resp.status().as_u16();
    debug!("received status {status_code}");
    Ok(Response {
        status_code,
        body: resp.into_body(),
    })
}
