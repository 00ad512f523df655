//! High-level client for one Explorer network.

use crate::{
    Error, Result,
    network,
    poll::{self, CountRequest, PollPolicy, RowsRequest},
    schema::{self, SchemaField},
    transport::{HttpTransport, Transport, TransportOptions},
    types::{self, Collection, FilterClause, Filters, QueryPage, QuerySpec, ScalarValue, Table},
};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Settings for [`ExplorerClient::with_options`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub transport: TransportOptions,
    /// Budget used by [`ExplorerClient::query`] and [`ExplorerClient::count`]
    pub poll: PollPolicy,
    /// How long fetched schemas are reused; zero disables caching.
    pub schema_ttl: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            poll: PollPolicy::default(),
            schema_ttl: Duration::from_secs(300),
        }
    }
}

/// Client for one Explorer network.
///
/// ```no_run
/// use explorer_client::{ExplorerClient, FilterClause, QuerySpec};
///
/// # async fn run() -> explorer_client::Result<()> {
/// let client = ExplorerClient::new("hifisolves")?;
/// let spec = QuerySpec::new("gnomad", "collections.gnomad.variants")
///     .filter("chrom", FilterClause::eq("chr1"))
///     .limit(10);
/// let page = client.query(&spec).await?;
/// println!("{} rows", page.data.len());
/// # Ok(())
/// # }
/// ```
pub struct ExplorerClient<T: Transport = HttpTransport> {
    transport: T,
    base_url: url::Url,
    poll: PollPolicy,
    schema_cache: Option<Cache<(String, String), Value>>,
}

impl ExplorerClient<HttpTransport> {
    /// Connect to a network by short name, host or URL with default options.
    pub fn new(network: &str) -> Result<Self> {
        Self::with_options(network, ClientOptions::default())
    }

    pub fn with_options(network: &str, options: ClientOptions) -> Result<Self> {
        let base_url = network::resolve(network)?;
        let transport = HttpTransport::new(base_url.clone(), options.transport)?;
        Ok(Self::from_parts(transport, base_url, options.poll, options.schema_ttl))
    }

    pub fn access_token(&self) -> Option<String> {
        self.transport.access_token()
    }

    /// Set or replace the bearer token sent with every request.
    ///
    /// Cached schemas are dropped, since they were fetched under the old token.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.transport.set_access_token(token);
        self.invalidate_schemas();
    }

    pub fn clear_access_token(&self) {
        self.transport.clear_access_token();
        self.invalidate_schemas();
    }
}

impl<T: Transport> ExplorerClient<T> {
    /// Use a custom transport; `network` only determines [`Self::base_url`].
    pub fn with_transport(network: &str, transport: T) -> Result<Self> {
        let base_url = network::resolve(network)?;
        let defaults = ClientOptions::default();
        Ok(Self::from_parts(transport, base_url, defaults.poll, defaults.schema_ttl))
    }

    fn from_parts(transport: T, base_url: url::Url, poll: PollPolicy, schema_ttl: Duration) -> Self {
        Self {
            transport,
            base_url,
            poll,
            schema_cache: schema_cache(schema_ttl),
        }
    }

    /// Replace the schema cache with one of the given TTL; zero disables caching.
    pub fn with_schema_ttl(mut self, ttl: Duration) -> Self {
        self.schema_cache = schema_cache(ttl);
        self
    }

    /// Forget all cached schemas.
    pub fn invalidate_schemas(&self) {
        if let Some(cache) = &self.schema_cache {
            cache.invalidate_all();
        }
    }

    /// Replace the default poll budget.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn base_url(&self) -> &str {
        network::display(&self.base_url)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// List all collections on this network.
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let body = self.transport.get(&["api", "collections"]).await?;
        decode_list(&body, "collections")
    }

    /// List the tables of a collection.
    pub async fn list_tables(&self, collection: &str) -> Result<Vec<Table>> {
        if collection.trim().is_empty() {
            return Err(Error::Validation("collection is required".to_string()));
        }
        let body = self
            .transport
            .get(&["api", "collections", collection, "tables"])
            .await?;
        decode_list(&body, "tables")
    }

    /// Raw schema document of a table.
    pub async fn get_schema(&self, collection: &str, table: &str) -> Result<Value> {
        types::require_identifiers(collection, table)?;
        let key = (collection.to_string(), table.to_string());

        if let Some(cache) = &self.schema_cache {
            if let Some(schema) = cache.get(&key).await {
                tracing::debug!(collection, table, "schema cache hit");
                return Ok(schema);
            }
        }

        let body = self
            .transport
            .get(&[
                "api",
                "collection",
                collection,
                "data-connect",
                "table",
                table,
                "info",
            ])
            .await?;
        let schema: Value = serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("schema response is not JSON: {e}")))?;

        if let Some(cache) = &self.schema_cache {
            cache.insert(key, schema.clone()).await;
        }
        Ok(schema)
    }

    /// Flattened `{field, type, sql_type}` listing of a table schema.
    pub async fn get_schema_fields(&self, collection: &str, table: &str) -> Result<Vec<SchemaField>> {
        let schema = self.get_schema(collection, table).await?;
        schema::flatten_fields(&schema)
    }

    /// Run a filtered query with the client's poll budget.
    pub async fn query(&self, spec: &QuerySpec) -> Result<QueryPage> {
        self.query_with_polling(spec, self.poll).await
    }

    pub async fn query_with_polling(&self, spec: &QuerySpec, policy: PollPolicy) -> Result<QueryPage> {
        spec.validate()?;
        let page = poll::execute(&self.transport, &RowsRequest(spec), policy).await?;
        tracing::info!(
            collection = %spec.collection,
            table = %spec.table,
            rows = page.data.len(),
            "query completed"
        );
        Ok(page)
    }

    /// Equality query from `field = value` pairs, returning just the rows.
    ///
    /// ```no_run
    /// use explorer_client::ScalarValue;
    ///
    /// # async fn run(client: explorer_client::ExplorerClient) -> explorer_client::Result<()> {
    /// let rows = client
    ///     .simple_query(
    ///         "gnomad",
    ///         "collections.gnomad.variants",
    ///         [("chrom", ScalarValue::from("chr1")), ("pos", ScalarValue::from(12345))],
    ///     )
    ///     .await?;
    /// println!("{} rows", rows.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn simple_query<I, K>(&self, collection: &str, table: &str, fields: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = (K, ScalarValue)>,
        K: Into<String>,
    {
        let filters = fields
            .into_iter()
            .fold(Filters::new(), |filters, (field, value)| {
                filters.and(field, FilterClause::eq(value))
            });
        let spec = QuerySpec::new(collection, table).filters(filters);
        Ok(self.query(&spec).await?.data)
    }

    /// Count rows matching the filters of `spec` with the client's poll budget.
    ///
    /// Paging and ordering in `spec` are ignored.
    pub async fn count(&self, spec: &QuerySpec) -> Result<u64> {
        self.count_with_polling(spec, self.poll).await
    }

    pub async fn count_with_polling(&self, spec: &QuerySpec, policy: PollPolicy) -> Result<u64> {
        spec.validate()?;
        let result = poll::execute(&self.transport, &CountRequest(spec), policy).await?;
        tracing::info!(
            collection = %spec.collection,
            table = %spec.table,
            count = result.count,
            "count completed"
        );
        Ok(result.count)
    }
}

fn schema_cache(ttl: Duration) -> Option<Cache<(String, String), Value>> {
    (!ttl.is_zero()).then(|| Cache::builder().time_to_live(ttl).max_capacity(256).build())
}

fn decode_list<D: DeserializeOwned>(body: &str, what: &str) -> Result<Vec<D>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Decode(format!("{what} response is not JSON: {e}")))?;

    if !value.is_array() {
        return Err(Error::Decode(format!(
            "expected a list of {what}, got {}",
            kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| Error::Decode(format!("invalid {what} entry: {e}")))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "an object",
        Value::Array(_) => "a list",
        _ => "a scalar",
    }
}
