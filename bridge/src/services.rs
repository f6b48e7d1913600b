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

use crate::Config;
use log::debug;
use once_cell::sync::OnceCell;
use sigv4_bridge_aws_v4::{RequestSigner, StaticCredentialProvider, StsClient, STS_SERVICE};
use sigv4_bridge_core::{Context, Signer};
use std::sync::Arc;

/// Clients shared by every invocation of one process.
#[derive(Debug)]
pub struct Services {
    /// STS client bound to the configured region.
    pub sts: Arc<StsClient>,
}

impl Services {
    /// Build the clients for `config`.
    ///
    /// The STS client signs its own calls with the static identity of `config`.
    pub fn new(ctx: &Context, config: &Config) -> Self {
        let signer = Signer::new(
            ctx.clone(),
            StaticCredentialProvider::from(config.static_credential()),
            RequestSigner::new(STS_SERVICE, &config.region),
        );
        let sts = StsClient::new(&config.region, signer).with_endpoint(&config.sts_endpoint());

        Self { sts: Arc::new(sts) }
    }
}

/// ServiceCache holds [`Services`] once they have been built.
///
/// Initialisation runs at most once, even when several invocations race on a cold start.
/// There is no invalidation: the cache lives as long as its owner.
#[derive(Debug, Default)]
pub struct ServiceCache {
    cell: OnceCell<Arc<Services>>,
}

impl ServiceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached services, building them from `config` on first use.
    pub fn get_or_init(&self, ctx: &Context, config: &Config) -> Arc<Services> {
        self.get_or_init_with(|| Services::new(ctx, config))
    }

    /// Get the cached services, building them with `f` on first use.
    pub fn get_or_init_with(&self, f: impl FnOnce() -> Services) -> Arc<Services> {
        self.cell
            .get_or_init(|| {
                debug!("initializing service clients");
                Arc::new(f())
            })
            .clone()
    }

    /// Get the cached services without building them.
    pub fn get(&self) -> Option<Arc<Services>> {
        self.cell.get().cloned()
    }
}
