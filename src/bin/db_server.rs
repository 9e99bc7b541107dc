use std::path::PathBuf;

use bucketdb::{
    server::{
        config::{Config, Overrides, Role},
        Server,
    },
    telemetry::{initialize_fmt_subscriber, initialize_jaeger_subscriber, shutdown_tracer_provider},
};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Bucket,
    Directory,
}

#[derive(Debug, Parser)]
#[command(name = "bucketdb-server")]
#[command(about = "bucketdb bucket/directory http server", long_about = None)]
struct Cli {
    /// JSON config file. Takes precedence over --role
    #[arg(long, env = "BUCKETDB_CONFIG")]
    config_path: Option<PathBuf>,
    /// role to run with default settings when no config file is given
    #[arg(long, env = "BUCKETDB_ROLE", value_enum, default_value = "directory")]
    role: RoleArg,
    #[arg(long, env = "PORT")]
    port: Option<u16>,
    #[arg(long, env = "BUCKET_ID")]
    bucket_id: Option<usize>,
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "BUCKET_COUNT")]
    bucket_count: Option<usize>,
    #[arg(short, long, default_value = "false")]
    tracing_jaeger: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = match &args.config_path {
        Some(path) => Config::from_path(path).await?,
        None => match args.role {
            RoleArg::Bucket => Config::bucket(args.bucket_id.unwrap_or_default()),
            RoleArg::Directory => Config::directory(),
        },
    }
    .with_overrides(Overrides {
        port: args.port,
        bucket_id: args.bucket_id,
        data_dir: args.data_dir,
        bucket_count: args.bucket_count,
    });

    if args.tracing_jaeger {
        let role = match &config.role {
            Role::Bucket(bucket) => format!("bucket-{}", bucket.bucket_id),
            Role::Directory(_) => "directory".to_string(),
        };
        initialize_jaeger_subscriber("http://localhost:4317/v1/traces", &role)?;
    } else {
        initialize_fmt_subscriber()?;
    }

    let server = Server::from_parsed_config(config).await?;
    server.run(tokio::signal::ctrl_c()).await?;

    shutdown_tracer_provider();
    Ok(())
}
