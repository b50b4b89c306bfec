use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "disco-cli")]
#[command(about = "Command-line client for a Disco Light server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the API usage hint
    Status,
    /// Set the light colour, as RRGGBB hex
    Set { color: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/", base)).send().await?,
        Commands::Set { color } => {
            let color = color.trim_start_matches('#');
            if color.len() < 6 || !color.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("{:?} is not an RRGGBB colour", color).into());
            }
            client
                .get(format!("{}/?color={}", base, color))
                .send()
                .await?
        }
    };

    print_response(res).await
}

/// The server answers with one JSON object per line.
async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let json: serde_json::Value = serde_json::from_str(line)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
