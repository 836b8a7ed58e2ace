use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    netterrain_lib::run().await
}
