use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "nav-cli")]
#[command(about = "Command-line client for the navigation backend", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service and database health
    Health,
    /// List recently saved addresses
    Addresses {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Resolve an address to coordinates
    Geocode { address: String },
    /// Resolve an address and route to it from a starting point
    Navigate {
        address: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Current speed in meters per second, for an ETA
        #[arg(long)]
        speed: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/api/health", base)).send().await?,
        Commands::Addresses { limit } => {
            client
                .get(format!("{}/api/addresses", base))
                .query(&[("limit", limit)])
                .send()
                .await?
        }
        Commands::Geocode { address } => {
            client
                .post(format!("{}/api/geocode", base))
                .json(&json!({ "address": address }))
                .send()
                .await?
        }
        Commands::Navigate { address, lat, lng, speed } => {
            client
                .post(format!("{}/api/navigate", base))
                .json(&json!({
                    "address": address,
                    "from": { "lat": lat, "lng": lng },
                    "speedMps": speed,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(retry) = res.headers().get(reqwest::header::RETRY_AFTER) {
        eprintln!("Retry-After: {}s", retry.to_str().unwrap_or("?"));
    }

    let json: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        eprintln!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
