// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{execute, Config, CredentialSource, RequestDescriptor, Response, ServiceCache};
use log::debug;
use sigv4_bridge_aws_v4::RequestSigner;
use sigv4_bridge_core::{Context, Error, Result, SignRequest};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Bridge turns one invocation into one signed request against the configured target.
///
/// Build it once per process and share it between invocations: it owns the cached
/// service clients.
#[derive(Debug)]
pub struct Bridge {
    ctx: Context,
    config: Arc<Config>,
    services: ServiceCache,
}

impl Bridge {
    /// Create a bridge from a config, validating it first.
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        config.validate()?;
        debug!("bridge configured: {config:?}");

        Ok(Self {
            ctx,
            config: Arc::new(config),
            services: ServiceCache::new(),
        })
    }

    /// Create a bridge from the env of `ctx`.
    pub fn from_env(ctx: Context) -> Result<Self> {
        let config = Config::from_env(&ctx);
        Self::new(ctx, config)
    }

    /// The validated config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The service clients cache.
    pub fn services(&self) -> &ServiceCache {
        &self.services
    }

    /// Handle one invocation.
    ///
    /// `event` and `context` are accepted for the host's calling convention and not read.
    pub async fn handle<E: ?Sized, C: ?Sized>(&self, event: &E, context: &C) -> Result<Response> {
        self.handle_with_cancel(event, context, &CancellationToken::new())
            .await
    }

    /// Handle one invocation, giving up with [`ErrorKind::Cancelled`](sigv4_bridge_core::ErrorKind::Cancelled)
    /// once `cancel` fires.
    ///
    /// Stages run strictly in order: credential resolution, signing, sending. A failure stops
    /// the invocation at that stage.
    pub async fn handle_with_cancel<E: ?Sized, C: ?Sized>(
        &self,
        _event: &E,
        _context: &C,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let source = CredentialSource::from_config(&self.config, || {
            self.services.get_or_init(&self.ctx, &self.config)
        });
        let set = cancellable(
            cancel,
            "credential resolution",
            source.resolve(&self.ctx, &self.config.region),
        )
        .await?;
        debug!("resolved credential: {set:?}");

        let req = RequestDescriptor::from_config(&self.config)?.into_request()?;
        let (mut parts, body) = req.into_parts();
        RequestSigner::new(&self.config.service, &set.region)
            .sign_request(&self.ctx, &mut parts, Some(&set.credential))
            .await?;
        let req = http::Request::from_parts(parts, body);

        cancellable(cancel, "request execution", execute(&self.ctx, req)).await
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    stage: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            debug!("invocation cancelled during {stage}");
            Err(Error::cancelled("invocation cancelled").with_context(format!("stage: {stage}")))
        }
        res = fut => res,
    }
}
