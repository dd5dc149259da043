use crate::storage::error::StoreError;

pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Build the canonical connection string for a storage account
pub fn build_connection_string(account: &str, key: &str) -> String {
    format!(
        "DefaultEndpointsProtocol={};AccountName={};AccountKey={};EndpointSuffix={}",
        DEFAULT_PROTOCOL, account, key, DEFAULT_ENDPOINT_SUFFIX
    )
}

/// Parsed storage account connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub protocol: String,
    pub account_name: String,
    pub account_key: String,
    pub endpoint_suffix: String,
    pub table_endpoint: Option<String>,
}

impl ConnectionString {
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        let mut protocol = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut endpoint_suffix = None;
        let mut table_endpoint = None;

        for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // account keys are base64 and end with '=', so split on the first one only
            let (name, val) = part
                .split_once('=')
                .ok_or_else(|| StoreError::Connection(format!("segment without '=': {}", part)))?;

            match name {
                "DefaultEndpointsProtocol" => protocol = Some(val.to_string()),
                "AccountName" => account_name = Some(val.to_string()),
                "AccountKey" => account_key = Some(val.to_string()),
                "EndpointSuffix" => endpoint_suffix = Some(val.to_string()),
                "TableEndpoint" => table_endpoint = Some(val.trim_end_matches('/').to_string()),
                other => tracing::debug!(setting = other, "Ignoring connection string setting"),
            }
        }

        let account_name = account_name
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StoreError::Connection("missing AccountName".to_string()))?;
        let account_key = account_key
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StoreError::Connection("missing AccountKey".to_string()))?;

        Ok(Self {
            protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            account_name,
            account_key,
            endpoint_suffix: endpoint_suffix.unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            table_endpoint,
        })
    }

    /// Base URL of the account's table service
    pub fn table_endpoint(&self) -> String {
        match &self.table_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "{}://{}.table.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ),
        }
    }
}

// keep the account key out of logs
impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("table_endpoint", &self.table_endpoint)
            .finish()
    }
}
