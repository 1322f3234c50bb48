use std::{process::exit, time::Duration};

use synthient_client::{AnonymizersQuery, Client, ClientError, RequestOptions, Result};
use tokio::io::AsyncBufReadExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("SYNTHIENT_API_KEY").unwrap_or_else(|_| {
        eprintln!("SYNTHIENT_API_KEY is not set");
        exit(1);
    });
    let client = Client::new(token);

    let query = AnonymizersQuery::new()
        .provider("BIRDPROXIES")
        .anonymizer_type("RESIDENTIAL_PROXY")
        .last_observed("7D")
        .country_code("US")
        .format("CSV")
        .full(false)
        .order("desc");

    // Give up if the whole feed has not arrived within ten minutes
    let options = RequestOptions::new().with_timeout(Duration::from_secs(600));
    let stream = client
        .stream_anonymizers_feed(&query, Some(&options))
        .await?;

    let url = stream.url().to_string();
    let mut lines = stream.into_async_read().lines();
    let mut count = 0u64;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|source| ClientError::Stream {
            url: url.clone(),
            source,
        })?
    {
        println!("{}", line);
        count += 1;
    }
    eprintln!("{} lines streamed", count);

    Ok(())
}
