use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::json;

use crate::storage::auth::SharedKeyLite;
use crate::storage::batch::{decode_batch_response, encode_upsert_batch, UpsertOperation};
use crate::storage::connection::{build_connection_string, ConnectionString};
use crate::storage::error::StoreError;
use crate::storage::models::{
    Continuation, Entity, EntityPage, ODataErrorResponse, QueryResponse, TableProvisioning,
};
use crate::storage::store::{EntitySource, EntityStore};

pub const API_VERSION: &str = "2019-02-02";
pub const MAX_BATCH_SIZE: usize = 100;

const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const JSON_ACCEPT: &str = "application/json;odata=minimalmetadata";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";

/// Table Service Client für einen Storage Account
#[derive(Debug, Clone)]
pub struct TableServiceClient {
    http: reqwest::Client,
    endpoint: Url,
    account: String,
    signer: SharedKeyLite,
}

impl TableServiceClient {
    pub fn from_connection_string(connection_string: &str) -> Result<Self, StoreError> {
        Self::new(&ConnectionString::parse(connection_string)?)
    }

    pub fn new(connection: &ConnectionString) -> Result<Self, StoreError> {
        let endpoint = Url::parse(&connection.table_endpoint())
            .map_err(|e| StoreError::Connection(format!("invalid table endpoint: {}", e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::Connection(format!(
                "table endpoint {} cannot carry a path",
                endpoint
            )));
        }

        let signer = SharedKeyLite::new(&connection.account_name, &connection.account_key)?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connection_verbose(false)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            account: connection.account_name.clone(),
            signer,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn get_table_client(&self, table_name: &str) -> TableClient {
        TableClient {
            service: self.clone(),
            table_name: table_name.to_string(),
        }
    }

    /// Create a table; fails with a 409 service error if it already exists
    pub async fn create_table(&self, table_name: &str) -> Result<(), StoreError> {
        let url = self.resource_url("Tables")?;

        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .json(&json!({ "TableName": table_name }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Create the table unless it is already there
    pub async fn ensure_table(&self, table_name: &str) -> TableProvisioning {
        match self.create_table(table_name).await {
            Ok(()) => TableProvisioning::Created,
            Err(e) if e.is_already_exists() => TableProvisioning::AlreadyExists,
            Err(e) => TableProvisioning::Failed(e),
        }
    }

    /// Append one raw path segment to the endpoint, percent-encoding it
    fn resource_url(&self, resource: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Connection(format!("invalid table endpoint: {}", self.endpoint)))?
            .pop_if_empty()
            .push(resource);
        Ok(url)
    }

    /// Signed request with the headers every Table service call needs
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let date = SharedKeyLite::format_date(Utc::now());
        let authorization = self.signer.authorization(&date, url.path());

        self.http
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
            .header(ACCEPT, JSON_ACCEPT)
            .header(AUTHORIZATION, authorization)
    }
}

/// Service client for `account`, authenticated with its shared key
pub fn connect(account: &str, key: &str) -> Result<TableServiceClient, StoreError> {
    TableServiceClient::from_connection_string(&build_connection_string(account, key))
}

/// Client bound to a single table
#[derive(Debug, Clone)]
pub struct TableClient {
    service: TableServiceClient,
    table_name: String,
}

impl TableClient {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn account(&self) -> &str {
        self.service.account()
    }

    /// Fetch one page of a full table scan
    pub async fn query_page(&self, continuation: Option<&Continuation>) -> Result<EntityPage, StoreError> {
        let mut url = self.service.resource_url(&format!("{}()", self.table_name))?;
        if let Some(next) = continuation {
            let mut query = url.query_pairs_mut();
            query.append_pair("NextPartitionKey", &next.next_partition_key);
            if let Some(row_key) = &next.next_row_key {
                query.append_pair("NextRowKey", row_key);
            }
        }

        let response = self.service.request(Method::GET, url).send().await?;
        let response = check_status(response).await?;

        let continuation = header_value(&response, NEXT_PARTITION_KEY).map(|next_partition_key| Continuation {
            next_partition_key,
            next_row_key: header_value(&response, NEXT_ROW_KEY),
        });

        let text = response.text().await?;
        let page: QueryResponse = serde_json::from_str(&text)?;

        Ok(EntityPage {
            entities: page.value,
            continuation,
        })
    }

    fn entity_url(&self, entity: &Entity) -> Result<Url, StoreError> {
        self.service.resource_url(&format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table_name,
            escape_key(entity.partition_key()),
            escape_key(entity.row_key())
        ))
    }
}

#[async_trait]
impl EntitySource for TableClient {
    async fn list_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let mut entities = Vec::new();
        let mut continuation = None;

        loop {
            let page = self.query_page(continuation.as_ref()).await?;
            tracing::debug!(
                table = %self.table_name,
                page_size = page.entities.len(),
                has_more = page.continuation.is_some(),
                "Fetched entity page"
            );
            entities.extend(page.entities);

            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        Ok(entities)
    }
}

#[async_trait]
impl EntityStore for TableClient {
    async fn submit_transaction(&self, entities: &[Entity]) -> Result<(), StoreError> {
        let Some(first) = entities.first() else {
            return Ok(());
        };
        if entities.len() > MAX_BATCH_SIZE {
            return Err(StoreError::Entity(format!(
                "transaction holds {} entities, limit is {}",
                entities.len(),
                MAX_BATCH_SIZE
            )));
        }
        if let Some(other) = entities.iter().find(|e| e.partition_key() != first.partition_key()) {
            return Err(StoreError::Entity(format!(
                "transaction mixes partitions '{}' and '{}'",
                first.partition_key(),
                other.partition_key()
            )));
        }

        let operations = entities
            .iter()
            .map(|entity| {
                Ok(UpsertOperation {
                    url: self.entity_url(entity)?,
                    payload: entity.to_write_payload(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let batch = encode_upsert_batch(&operations)?;

        let url = self.service.resource_url("$batch")?;
        let response = self
            .service
            .request(Method::POST, url)
            .header(CONTENT_TYPE, batch.content_type)
            .body(batch.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err = service_error(response).await;
            // a batch the service refuses as a whole is still a failed transaction
            return Err(match err {
                StoreError::Service { status, code, message }
                    if status == StatusCode::BAD_REQUEST || status == StatusCode::PAYLOAD_TOO_LARGE =>
                {
                    StoreError::Transaction { status, code, message }
                }
                other => other,
            });
        }

        let body = response.text().await?;
        decode_batch_response(&body)?;
        Ok(())
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<(), StoreError> {
        let url = self.entity_url(entity)?;

        let response = self
            .service
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, "application/json")
            .json(&entity.to_write_payload())
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Keys are quoted with single quotes inside the resource path
fn escape_key(key: &str) -> String {
    key.replace('\'', "''")
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(service_error(response).await)
    }
}

async fn service_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (code, message) = ODataErrorResponse::parse(&body).unwrap_or_else(|| {
        (
            status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        )
    });

    StoreError::Service {
        status,
        code,
        message,
    }
}
