use bucketdb::{
    client::http::{connection_pool, HttpClient},
    cmd::{
        delete::DeleteResponse,
        get::GetResponse,
        health::DirectoryHealth,
        put::PutResponse,
        Routed,
    },
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Parser)]
#[command(name = "bucketdb-client")]
#[command(about = "bucketdb-client http client for the directory", long_about = None)]
struct Cli {
    /// directory address
    #[arg(long, env = "BUCKETDB_DIRECTORY", default_value = "http://127.0.0.1:3000")]
    addr: String,
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Put {
        #[arg(short)]
        key: String,
        #[arg(short, default_value = "")]
        value: String,
    },
    Get {
        #[arg(short)]
        key: String,
    },
    Delete {
        #[arg(short)]
        key: String,
    },
    Health,
}

async fn print<T: Serialize>(response: &T) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&serde_json::to_vec_pretty(response)?)
        .await?;
    stdout.write_all(b"\n").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let timeout = Duration::from_millis(args.timeout_ms);
    let client = HttpClient::new(&args.addr, connection_pool(timeout, timeout)?)?;

    match args.command {
        Commands::Put { key, value } => {
            let response: Routed<PutResponse> = client.put_as(&key, &value).await?;
            print(&response).await?;
        }
        Commands::Get { key } => {
            let response: Routed<GetResponse> = client.get_as(&key).await?;
            print(&response).await?;
        }
        Commands::Delete { key } => {
            let response: Routed<DeleteResponse> = client.delete_as(&key).await?;
            print(&response).await?;
        }
        Commands::Health => {
            let response: DirectoryHealth = client.health_as().await?;
            print(&response).await?;
        }
    }

    Ok(())
}
