use crate::credential::Credential;
use crate::sts::{AssumeRoleInput, StsClient};
use async_trait::async_trait;
use log::warn;
use sigv4_bridge_core::time::parse_rfc3339;
use sigv4_bridge_core::{Context, Error, ProvideCredential, Result};
use std::sync::Arc;

/// Session lifetime requested from STS.
pub const DEFAULT_DURATION_SECONDS: u32 = 3600;
/// Session name attached to every assumed role session.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "sigv4-bridge";

/// AssumeRoleCredentialProvider will load credential via assume role.
///
/// The STS client is shared so that it is only built once per process.
#[derive(Debug, Clone)]
pub struct AssumeRoleCredentialProvider {
    client: Arc<StsClient>,

    role_arn: String,
}

impl AssumeRoleCredentialProvider {
    /// Create a new assume role provider for `role_arn`.
    pub fn new(client: Arc<StsClient>, role_arn: &str) -> Self {
        Self {
            client,
            role_arn: role_arn.to_string(),
        }
    }

    /// The role this provider assumes.
    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let input = AssumeRoleInput {
            role_arn: self.role_arn.clone(),
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
            duration_seconds: DEFAULT_DURATION_SECONDS,
        };
        let output = self.client.assume_role(ctx, &input).await?;

        let Some(resp_cred) = output.credentials else {
            // Keep going with an empty credential, signing will reject it.
            warn!(
                "AssumeRole for {} returned no credentials, request id: {:?}",
                self.role_arn, output.request_id
            );
            return Ok(Some(Credential::default()));
        };

        let expiration = resp_cred.expiration.trim();
        let expires_in = if expiration.is_empty() {
            None
        } else {
            Some(parse_rfc3339(expiration).map_err(|e| {
                Error::credential_exchange("failed to parse AssumeRole credential expiration")
                    .with_source(e)
                    .with_context(format!("expiration_value: {expiration}"))
                    .with_context(format!("role_arn: {}", self.role_arn))
            })?)
        };

        let session_token = resp_cred.session_token.trim();
        Ok(Some(Credential {
            access_key_id: resp_cred.access_key_id.trim().to_string(),
            secret_access_key: resp_cred.secret_access_key.trim().to_string(),
            session_token: (!session_token.is_empty()).then(|| session_token.to_string()),
            expires_in,
        }))
    }
}
