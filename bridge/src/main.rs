use log::error;
use sigv4_bridge::Bridge;
use sigv4_bridge_core::{Context, OsEnv};
use sigv4_bridge_http_send_reqwest::ReqwestHttpSend;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("invocation failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("sigv4-bridge/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::new(client))
        .with_env(OsEnv);

    let bridge = Bridge::from_env(ctx)?;
    let resp = bridge
        .handle(&serde_json::Value::Null, &serde_json::Value::Null)
        .await?;

    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}
