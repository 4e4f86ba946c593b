//! Azure storage connection strings.

use crate::error::{Error, Result};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_SUFFIX: &str = "core.windows.net";

/// The parts of a storage connection string this crate understands.
///
/// Requests are authorized with the shared access signature; account key
/// strings are rejected.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub blob_endpoint: String,
    pub table_endpoint: String,
    /// SAS query string without the leading `?`.
    pub sas: String,
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs.
    pub fn parse(s: &str) -> Result<Self> {
        let mut protocol = DEFAULT_PROTOCOL.to_string();
        let mut suffix = DEFAULT_SUFFIX.to_string();
        let mut account_name = None;
        let mut account_key = false;
        let mut blob_endpoint = None;
        let mut table_endpoint = None;
        let mut sas = None;

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::Config(format!("malformed connection string segment '{}'", key_only(pair)))
            })?;
            let value = value.trim();
            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "EndpointSuffix" => suffix = value.to_string(),
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = true,
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "TableEndpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
                "SharedAccessSignature" => sas = Some(value.trim_start_matches('?').to_string()),
                "UseDevelopmentStorage" => {
                    return Err(Error::Config(
                        "development storage needs account key signing, which is not supported; \
                         leave AzureWebJobsStorage empty to use local storage"
                            .to_string(),
                    ))
                }
                other => tracing::debug!(key = other, "ignoring connection string key"),
            }
        }

        let sas = match sas {
            Some(sas) if !sas.is_empty() => sas,
            _ if account_key => {
                return Err(Error::Config(
                    "account key connection strings are not supported; use a SharedAccessSignature connection string"
                        .to_string(),
                ))
            }
            _ => {
                return Err(Error::Config(
                    "connection string has no SharedAccessSignature".to_string(),
                ))
            }
        };

        let endpoint = |explicit: Option<String>, service: &str| -> Result<String> {
            match (explicit, &account_name) {
                (Some(url), _) => Ok(url),
                (None, Some(account)) => Ok(format!("{}://{}.{}.{}", protocol, account, service, suffix)),
                (None, None) => Err(Error::Config(format!(
                    "connection string needs {}Endpoint or AccountName",
                    capitalize(service)
                ))),
            }
        };
        let blob_endpoint = endpoint(blob_endpoint, "blob")?;
        let table_endpoint = endpoint(table_endpoint, "table")?;

        Ok(Self {
            account_name,
            blob_endpoint,
            table_endpoint,
            sas,
        })
    }

    /// Account name, from the string or the blob endpoint host.
    pub fn account(&self) -> Option<&str> {
        self.account_name.as_deref().or_else(|| {
            self.blob_endpoint
                .split("://")
                .nth(1)
                .and_then(|host| host.split('.').next())
                .filter(|s| !s.is_empty())
        })
    }

    /// Append the SAS to a URL that has no query yet.
    pub fn signed(&self, url: &str) -> String {
        format!("{}?{}", url, self.sas)
    }

    /// Append the SAS to a URL that already has a query.
    pub fn signed_with_query(&self, url: &str, query: &str) -> String {
        format!("{}?{}&{}", url, query, self.sas)
    }
}

fn key_only(pair: &str) -> &str {
    pair.split('=').next().unwrap_or(pair)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("table_endpoint", &self.table_endpoint)
            .field("sas", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_with_sas() {
        let cs = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=acct;SharedAccessSignature=?sv=2022-11-02&sig=abc%3D;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(cs.blob_endpoint, "https://acct.blob.core.windows.net");
        assert_eq!(cs.table_endpoint, "https://acct.table.core.windows.net");
        assert_eq!(cs.sas, "sv=2022-11-02&sig=abc%3D");
        assert_eq!(cs.account(), Some("acct"));
        assert_eq!(
            cs.signed("https://acct.blob.core.windows.net/c/x.pptx"),
            "https://acct.blob.core.windows.net/c/x.pptx?sv=2022-11-02&sig=abc%3D"
        );
    }

    #[test]
    fn test_explicit_endpoints() {
        let cs = ConnectionString::parse(
            "BlobEndpoint=https://store.blob.core.windows.net/;TableEndpoint=https://store.table.core.windows.net;SharedAccessSignature=sv=1&sig=x",
        )
        .unwrap();
        assert_eq!(cs.blob_endpoint, "https://store.blob.core.windows.net");
        assert_eq!(cs.account(), Some("store"));
        assert_eq!(
            cs.signed_with_query("https://store.blob.core.windows.net/c", "restype=container"),
            "https://store.blob.core.windows.net/c?restype=container&sv=1&sig=x"
        );
    }

    #[test]
    fn test_rejects_account_key() {
        let err = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("account key")));
    }

    #[test]
    fn test_rejects_incomplete() {
        assert!(ConnectionString::parse("SharedAccessSignature=sv=1").is_err());
        assert!(ConnectionString::parse("UseDevelopmentStorage=true").is_err());
        assert!(ConnectionString::parse("garbage").is_err());
    }

    #[test]
    fn test_debug_hides_sas() {
        let cs = ConnectionString::parse("AccountName=a;SharedAccessSignature=sig=secret").unwrap();
        assert!(!format!("{:?}", cs).contains("secret"));
    }
}
