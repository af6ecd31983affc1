use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    chatrelay_cli::cli::app::run().await
}
