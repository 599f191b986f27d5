#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    onoff_store::cli::execute().await?;
    Ok(())
}
