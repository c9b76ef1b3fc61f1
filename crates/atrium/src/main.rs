//! Binary entry point for the Atrium server.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lib_atrium::init().await
}
