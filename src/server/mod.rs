//! The HTTP listener shared by both roles.
//!
//! A [`Server`] is built from a [`Config`]: a bucket config loads the partition first (a corrupt file fails
//! here, before anything is bound) and serves [`crate::bucket::handlers`]; a directory config builds the
//! pooled outbound client and serves [`crate::directory::handlers`].
//! [`Server::run`] serves until the provided shutdown future resolves, lets in-flight requests finish and then
//! drops everything the role owns (bucket store, directory connection pool).
use axum::Router;
use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::{event, Level};

use crate::{bucket::Bucket, directory::Directory};

use self::config::{BucketConfig, Config, DirectoryConfig, Role};

pub mod config;

pub struct Server {
    listener: TcpListener,
    router: Router,
    role: String,
}

impl Server {
    pub async fn from_config(path: PathBuf) -> anyhow::Result<Self> {
        let config = Config::from_path(&path).await?;
        Self::from_parsed_config(config).await
    }

    pub async fn from_parsed_config(config: Config) -> anyhow::Result<Self> {
        match config.role {
            Role::Bucket(BucketConfig {
                host,
                port,
                bucket_id,
                data_dir,
                storage_engine,
            }) => {
                let bucket = Bucket::open(bucket_id, storage_engine, &data_dir).await?;
                let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;

                Ok(Self {
                    listener,
                    router: crate::bucket::handlers::router(Arc::new(bucket)),
                    role: format!("bucket-{}", bucket_id),
                })
            }
            Role::Directory(config) => {
                let DirectoryConfig { host, port, .. } = &config;
                let directory = Directory::from_config(&config)?;
                let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;

                Ok(Self {
                    listener,
                    router: crate::directory::handlers::router(Arc::new(directory)),
                    role: "directory".to_string(),
                })
            }
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future + Send + 'static,
    {
        event!(
            Level::INFO,
            "{} listening on {}",
            self.role,
            self.listener.local_addr()?
        );

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.await;
            })
            .await?;

        event!(Level::INFO, "{} stopped", self.role);
        Ok(())
    }
}
