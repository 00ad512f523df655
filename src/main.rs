use clap::Parser;
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use explorer_client::{
    ExplorerClient,
    config::{Command, Config},
    network,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = run(&config).await.map_err(report)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// The single stderr report of a failed command, printed by `main`'s return.
fn report(err: explorer_client::Error) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", err.kind(), err)
}

async fn run(config: &Config) -> explorer_client::Result<Value> {
    let connect = || {
        let client = ExplorerClient::with_options(&config.network, config.client_options())?;
        tracing::info!("Using network {}", client.base_url());
        Ok::<_, explorer_client::Error>(client)
    };

    let output = match &config.command {
        Command::Networks => network::KNOWN_NETWORKS
            .iter()
            .map(|(name, host)| json!({"name": name, "host": host}))
            .collect::<Value>(),
        Command::Collections => json!(connect()?.list_collections().await?),
        Command::Tables { collection } => json!(connect()?.list_tables(collection).await?),
        Command::Schema {
            collection,
            table,
            fields,
        } => {
            let client = connect()?;
            if *fields {
                json!(client.get_schema_fields(collection, table).await?)
            } else {
                client.get_schema(collection, table).await?
            }
        }
        Command::Query(args) => json!(connect()?.query(&args.spec()).await?),
        Command::Count(args) => json!({"count": connect()?.count(&args.spec()).await?}),
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_carries_kind_and_message() {
        let err = explorer_client::Error::from_status(403, "collection is restricted".to_string());
        let report = report(err).to_string();
        assert!(report.starts_with("AuthenticationError: "));
        assert!(report.contains("collection is restricted"));
    }
}
