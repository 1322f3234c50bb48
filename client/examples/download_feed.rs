use std::process::exit;

use synthient_client::{AnonymizersQuery, Client, ClientError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(String::as_str).unwrap_or("feed.csv");

    let token = std::env::var("SYNTHIENT_API_KEY").unwrap_or_else(|_| {
        eprintln!("SYNTHIENT_API_KEY is not set");
        exit(1);
    });
    let client = Client::new(token);

    let query = AnonymizersQuery::new().format("CSV");
    match client.download_anonymizers_feed(&query, output, None).await {
        Ok(written) => println!("{} bytes downloaded to {}", written, output),
        Err(ClientError::FileExists { path }) => {
            eprintln!("{} already exists, refusing to overwrite", path.display());
            exit(1);
        }
        Err(ClientError::PaymentRequired { .. }) => {
            eprintln!("credits have run out, top up the account and retry");
            exit(1);
        }
        Err(err) => return Err(err),
    }

    Ok(())
}
