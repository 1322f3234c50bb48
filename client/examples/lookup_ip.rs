use std::process::exit;

use synthient_client::{Client, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Address to look up is the first argument
    let args: Vec<String> = std::env::args().collect();
    let ip = args.get(1).map(String::as_str).unwrap_or("213.149.183.127");

    let token = std::env::var("SYNTHIENT_API_KEY").unwrap_or_else(|_| {
        eprintln!("SYNTHIENT_API_KEY is not set");
        exit(1);
    });
    let client = Client::new(token);

    let record = client.get_ip(ip, None).await?;
    println!("IP: {}", record.ip);
    println!(
        "Network: AS{} {} ({})",
        record.network.asn, record.network.isp, record.network.network_type
    );
    println!(
        "Location: {}, {}, {}",
        record.location.city, record.location.state, record.location.country
    );
    println!("Risk: {}", record.ip_data.ip_risk);
    for enrichment in &record.ip_data.enriched {
        println!(
            "- seen by {} as {} (last seen {})",
            enrichment.provider, enrichment.enrichment_type, enrichment.last_seen
        );
    }

    Ok(())
}
