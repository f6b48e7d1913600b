use crate::{Context, ProvideCredential, Result, SignRequest, SigningCredential};
use std::sync::Arc;

/// Signer couples a credential provider with a request signer.
///
/// The credential is provided again on every call; nothing is cached between calls.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    provider: Arc<dyn ProvideCredential<Credential = K>>,
    signer: Arc<dyn SignRequest<Credential = K>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer.
    pub fn new(
        ctx: Context,
        provider: impl ProvideCredential<Credential = K>,
        signer: impl SignRequest<Credential = K>,
    ) -> Self {
        Self {
            ctx,
            provider: Arc::new(provider),
            signer: Arc::new(signer),
        }
    }

    /// Signing request.
    pub async fn sign(&self, req: &mut http::request::Parts) -> Result<()> {
        let cred = self.provider.provide_credential(&self.ctx).await?;

        self.signer
            .sign_request(&self.ctx, req, cred.as_ref())
            .await
    }
}
