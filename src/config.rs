use crate::{
    client::ClientOptions,
    network::DEFAULT_NETWORK,
    poll::PollPolicy,
    transport::TransportOptions,
    types::{Direction, FilterClause, Filters, QuerySpec, ScalarValue},
};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "explorer")]
#[command(about = "Query Explorer genomics data catalogs")]
pub struct Config {
    /// Network short name, host or base URL
    #[arg(short, long, env = "EXPLORER_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Bearer token for restricted collections
    #[arg(long, env = "EXPLORER_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Maximum number of polls per query
    #[arg(long, env = "EXPLORER_MAX_POLLS", default_value = "10")]
    pub max_polls: u32,

    /// Delay between polls in milliseconds
    #[arg(long, env = "EXPLORER_POLL_INTERVAL_MS", default_value = "2000")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds (0 disables)
    #[arg(long, env = "EXPLORER_TIMEOUT_SECS", default_value = "60")]
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the known network short names
    Networks,
    /// List collections on the network
    Collections,
    /// List tables in a collection
    Tables { collection: String },
    /// Show a table schema
    Schema {
        collection: String,
        table: String,
        /// Print the flattened field list instead of the raw schema
        #[arg(long)]
        fields: bool,
    },
    /// Run a filtered query
    Query(QueryArgs),
    /// Count rows matching filters
    Count(FilterArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    pub collection: String,
    pub table: String,

    /// Filters as JSON, e.g. '{"chrom":[{"operation":"EQ","value":"chr1","type":"STRING"}]}'
    #[arg(long, value_parser = parse_filters)]
    pub filters: Option<Filters>,

    /// Equality filter FIELD=VALUE; the value type is inferred (repeatable)
    #[arg(long = "eq", value_name = "FIELD=VALUE", value_parser = parse_eq)]
    pub eq: Vec<(String, ScalarValue)>,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Maximum number of rows to return
    #[arg(long, default_value = "100")]
    pub limit: u32,

    /// Number of rows to skip
    #[arg(long, default_value = "0")]
    pub offset: u64,

    /// Field to order by
    #[arg(long)]
    pub order_by: Option<String>,

    /// Order descending
    #[arg(long, requires = "order_by")]
    pub desc: bool,
}

impl Config {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_polls, Duration::from_millis(self.poll_interval_ms))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            transport: TransportOptions {
                access_token: self.token.clone(),
                request_timeout: (self.timeout_secs > 0)
                    .then(|| Duration::from_secs(self.timeout_secs)),
                ..TransportOptions::default()
            },
            poll: self.poll_policy(),
            ..ClientOptions::default()
        }
    }
}

impl FilterArgs {
    pub fn spec(&self) -> QuerySpec {
        let filters = self
            .eq
            .iter()
            .fold(self.filters.clone().unwrap_or_default(), |filters, (field, value)| {
                filters.and(field.clone(), FilterClause::eq(value.clone()))
            });
        QuerySpec::new(self.collection.clone(), self.table.clone()).filters(filters)
    }
}

impl QueryArgs {
    pub fn spec(&self) -> QuerySpec {
        let spec = self.filter.spec().limit(self.limit).offset(self.offset);
        match &self.order_by {
            Some(field) => {
                let direction = if self.desc { Direction::Desc } else { Direction::Asc };
                spec.order_by(field.clone(), direction)
            }
            None => spec,
        }
    }
}

fn parse_filters(raw: &str) -> Result<Filters, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid filters JSON: {e}"))
}

fn parse_eq(raw: &str) -> Result<(String, ScalarValue), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), ScalarValue::infer(value)))
        }
        _ => Err(format!("expected FIELD=VALUE, got {raw:?}")),
    }
}
