use anyhow::Context;
use http_scaffold::tools::system;
use http_scaffold::web::warp::run_webserver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = http_scaffold::bootstrap().context("Failed to load the configuration")?;

    system::install_termination_listener();
    run_webserver(config).await
}
