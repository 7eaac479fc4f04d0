//! CKAN catalog access.
//!
//! This module owns everything remote: resolving a dataset name to its list of
//! resources through the `package_show` action, picking the named
//! sub-resource, and downloading a CSV resource into a [`Table`].

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

use crate::error::DatasetError;
use crate::table::{self, Table};

pub use transport::{HttpTransport, Transport};

/// Catalog used when no other base URL is configured.
pub const DEFAULT_CATALOG_URL: &str = "https://data.wprdc.org";

/// The only resource format this crate loads.
pub const CSV_FORMAT: &str = "CSV";

const PACKAGE_SHOW_PATH: &str = "api/3/action/package_show";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_LEN: usize = 19;

/// Connection settings for a catalog.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Base URL of the CKAN instance (without the `/api/...` suffix).
    pub base_url: String,
    /// Overall limit on a metadata request. Resource downloads use it only
    /// for connecting and for the response head; the body may take longer.
    pub timeout: Duration,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("wprdc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One entry of a package's `resources` list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Resource {
    pub fn is_csv(&self) -> bool {
        self.format == CSV_FORMAT
    }

    /// Parsed `last_modified`, truncated to whole seconds.
    ///
    /// Returns `Ok(None)` when the catalog reports no modification time.
    pub fn last_modified_at(&self) -> Result<Option<NaiveDateTime>, DatasetError> {
        self.last_modified
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(parse_last_modified)
            .transpose()
    }
}

/// Parses a CKAN timestamp such as `2019-03-04T12:13:14.123456`.
///
/// Only the first 19 characters (`YYYY-MM-DDTHH:MM:SS`) are considered, so
/// fractional seconds and offsets are ignored.
pub fn parse_last_modified(value: &str) -> Result<NaiveDateTime, DatasetError> {
    let invalid = || DatasetError::InvalidTimestamp {
        value: value.to_string(),
    };
    let truncated = value.get(..TIMESTAMP_LEN).ok_or_else(invalid)?;
    NaiveDateTime::parse_from_str(truncated, TIMESTAMP_FORMAT).map_err(|_| invalid())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize)]
struct PackageShowResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<PackageShowResult>,
}

#[derive(Debug, Deserialize)]
struct PackageShowResult {
    #[serde(default)]
    resources: Vec<Resource>,
}

/// Client for one CKAN catalog.
#[derive(Clone)]
pub struct CatalogClient {
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Creates an HTTP client for the catalog described by `config`.
    pub fn new(config: &CatalogConfig) -> Result<Self, DatasetError> {
        let transport = HttpTransport::new(config.timeout, config.user_agent.clone());
        Self::with_transport(&config.base_url, Arc::new(transport))
    }

    /// Creates a client that issues its requests through `transport`.
    pub fn with_transport(
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DatasetError> {
        let mut url = Url::parse(base_url).map_err(|source| DatasetError::InvalidCatalogUrl {
            url: base_url.to_string(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(DatasetError::InvalidCatalogUrl {
                url: base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/api/3/action/package_show?id=<name>`.
    pub fn package_show_url(&self, name: &str) -> Result<Url, DatasetError> {
        let mut url = self
            .base_url
            .join(PACKAGE_SHOW_PATH)
            .map_err(|source| DatasetError::InvalidCatalogUrl {
                url: self.base_url.to_string(),
                source,
            })?;
        url.query_pairs_mut().append_pair("id", name);
        Ok(url)
    }

    /// All resources listed for the package `name`.
    pub fn package_resources(&self, name: &str) -> Result<Vec<Resource>, DatasetError> {
        let url = self.package_show_url(name)?;
        debug!(url = %url, "fetching package metadata");

        let body = self.transport.get(url.as_str())?;
        parse_package_show(&body, url.as_str())
    }

    /// The resource of package `name` whose display name is `sub_package`.
    pub fn resolve(&self, name: &str, sub_package: &str) -> Result<Resource, DatasetError> {
        self.package_resources(name)?
            .into_iter()
            .find(|resource| resource.name == sub_package)
            .ok_or_else(|| DatasetError::SubPackageNotFound {
                name: name.to_string(),
                sub_package: sub_package.to_string(),
            })
    }

    /// Downloads and parses a CSV resource.
    ///
    /// Fails with [`DatasetError::UnsupportedFormat`] before any download if the
    /// resource is not declared as CSV.
    pub fn fetch_table(&self, resource: &Resource) -> Result<Table, DatasetError> {
        if !resource.is_csv() {
            return Err(DatasetError::UnsupportedFormat {
                resource: resource.name.clone(),
                format: resource.format.clone(),
            });
        }

        let body = self.transport.download(&resource.url)?;
        table::from_csv_slice(&body, &resource.url)
    }
}

fn parse_package_show(body: &[u8], url: &str) -> Result<Vec<Resource>, DatasetError> {
    let response: PackageShowResponse =
        serde_json::from_slice(body).map_err(|source| DatasetError::CatalogParse {
            url: url.to_string(),
            source,
        })?;

    if response.success == Some(false) {
        return Err(DatasetError::CatalogRejected {
            url: url.to_string(),
            message: describe_catalog_error(response.error.as_ref()),
        });
    }

    response
        .result
        .map(|result| result.resources)
        .ok_or_else(|| DatasetError::CatalogRejected {
            url: url.to_string(),
            message: "response has no 'result' object".to_string(),
        })
}

/// Fuzz-only entrypoint for `package_show` response parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_package_show(bytes: &[u8]) -> Result<(), DatasetError> {
    for resource in parse_package_show(bytes, "<fuzz>")? {
        let _ = resource.last_modified_at();
    }
    Ok(())
}

fn describe_catalog_error(error: Option<&serde_json::Value>) -> String {
    match error {
        Some(value) => value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        None => "success=false".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct ScriptedTransport {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
            self.requests.lock().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| DatasetError::Http {
                url: url.to_string(),
                message: "http status: 404".to_string(),
            })
        }
    }

    const PACKAGE_URL: &str = "https://data.test/api/3/action/package_show?id=crashes";

    fn crashes_package() -> String {
        serde_json::json!({
            "success": true,
            "result": {
                "resources": [
                    {
                        "name": "2011 Crash Data",
                        "format": "CSV",
                        "url": "https://data.test/2011.csv",
                        "last_modified": "2019-03-04T12:13:14.123456"
                    },
                    {
                        "name": "Data Dictionary",
                        "format": "PDF",
                        "url": "https://data.test/dictionary.pdf",
                        "last_modified": null
                    }
                ]
            }
        })
        .to_string()
    }

    fn client(transport: ScriptedTransport) -> CatalogClient {
        CatalogClient::with_transport("https://data.test", Arc::new(transport)).expect("client")
    }

    #[test]
    fn package_show_url_encodes_name() {
        let client = client(ScriptedTransport::default());
        let url = client.package_show_url("parking transactions").expect("url");
        assert_eq!(
            url.as_str(),
            "https://data.test/api/3/action/package_show?id=parking+transactions"
        );
    }

    #[test]
    fn base_url_with_path_keeps_prefix() {
        let client = CatalogClient::with_transport(
            "https://portal.test/ckan",
            Arc::new(ScriptedTransport::default()),
        )
        .expect("client");
        let url = client.package_show_url("x").expect("url");
        assert_eq!(
            url.as_str(),
            "https://portal.test/ckan/api/3/action/package_show?id=x"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = CatalogClient::with_transport("not a url", Arc::new(ScriptedTransport::default()))
            .expect_err("should fail");
        assert!(matches!(err, DatasetError::InvalidCatalogUrl { .. }));
    }

    #[test]
    fn resolve_picks_named_resource() {
        let client = client(ScriptedTransport::default().with(PACKAGE_URL, &crashes_package()));
        let resource = client.resolve("crashes", "2011 Crash Data").expect("resolve");
        assert_eq!(resource.url, "https://data.test/2011.csv");
        assert!(resource.is_csv());
    }

    #[test]
    fn resolve_missing_sub_package_is_error() {
        let client = client(ScriptedTransport::default().with(PACKAGE_URL, &crashes_package()));
        let err = client.resolve("crashes", "2012 Crash Data").expect_err("should fail");
        match err {
            DatasetError::SubPackageNotFound { name, sub_package } => {
                assert_eq!(name, "crashes");
                assert_eq!(sub_package, "2012 Crash Data");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_catalog_parse_error() {
        let client = client(ScriptedTransport::default().with(PACKAGE_URL, "<html>oops</html>"));
        let err = client.package_resources("crashes").expect_err("should fail");
        assert!(matches!(err, DatasetError::CatalogParse { .. }));
    }

    #[test]
    fn unsuccessful_response_reports_catalog_message() {
        let body = r#"{"success": false, "error": {"message": "Not found", "__type": "Not Found Error"}}"#;
        let client = client(ScriptedTransport::default().with(PACKAGE_URL, body));
        let err = client.package_resources("crashes").expect_err("should fail");
        match err {
            DatasetError::CatalogRejected { message, .. } => assert_eq!(message, "Not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_csv_resource_is_not_downloaded() {
        let transport = Arc::new(ScriptedTransport::default());
        let client =
            CatalogClient::with_transport("https://data.test", transport.clone()).expect("client");
        let resource = Resource {
            name: "Data Dictionary".into(),
            format: "PDF".into(),
            url: "https://data.test/dictionary.pdf".into(),
            last_modified: None,
            id: None,
            description: None,
        };

        let err = client.fetch_table(&resource).expect_err("should fail");
        assert!(matches!(err, DatasetError::UnsupportedFormat { .. }));
        assert!(transport.requests.lock().is_empty());
    }

    #[test]
    fn last_modified_truncates_fraction() {
        let parsed = parse_last_modified("2019-03-04T12:13:14.123456").expect("parse");
        let expected = NaiveDate::from_ymd_opt(2019, 3, 4)
            .and_then(|d| d.and_hms_opt(12, 13, 14))
            .expect("valid date");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn short_or_garbled_timestamps_are_errors() {
        assert!(parse_last_modified("2019-03-04").is_err());
        assert!(parse_last_modified("yesterday at noon, roughly").is_err());
    }

    #[test]
    fn null_last_modified_is_none() {
        let resources: Vec<Resource> = serde_json::from_value(serde_json::json!([
            {"name": "x", "format": "CSV", "url": "u", "last_modified": null}
        ]))
        .expect("parse");
        assert_eq!(resources[0].last_modified_at().expect("ok"), None);
    }
}
