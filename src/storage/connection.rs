use super::shared_key::SharedKeyCredential;
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;
use url::Url;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

// Well-known account of the local storage emulator
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Storage service a connection string is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Blob,
    Table,
}

impl ServiceKind {
    fn endpoint_key(&self) -> &'static str {
        match self {
            Self::Blob => "blobendpoint",
            Self::Table => "tableendpoint",
        }
    }

    fn host_label(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Table => "table",
        }
    }

    fn development_endpoint(&self) -> &'static str {
        match self {
            Self::Blob => "http://127.0.0.1:10000/devstoreaccount1",
            Self::Table => "http://127.0.0.1:10002/devstoreaccount1",
        }
    }
}

/// How requests to a remote endpoint are authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// No credential; the container or table must allow public access.
    Anonymous,
    /// Shared access signature appended to every request URL.
    Sas(String),
    /// Account key used to sign every request.
    SharedKey(SharedKeyCredential),
}

impl Credential {
    pub fn sas(&self) -> Option<&str> {
        match self {
            Self::Sas(token) => Some(token),
            _ => None,
        }
    }
}

/// Where a storage service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEndpoint {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A REST endpoint.
    Remote { endpoint: Url, credential: Credential },
}

/// Resolves a connection identity for the given service.
///
/// Accepted forms:
/// - `file:///some/dir`
/// - a plain `https://...` endpoint, optionally carrying a SAS query string
/// - `key=value;...` connection strings with `LocalRoot`, with
///   `UseDevelopmentStorage=true`, or with `BlobEndpoint`/`TableEndpoint` (or
///   `AccountName`) plus `SharedAccessSignature` or `AccountKey`
///
/// A SAS takes precedence over an account key when both are given.
///
/// # Errors
///
/// Returns `InvalidConfig` for empty input, an undecodable account key, and
/// connection strings that name no usable endpoint or credential.
pub fn parse_connection(connection: &str, kind: ServiceKind) -> AppResult<StorageEndpoint> {
    let connection = connection.trim();
    if connection.is_empty() {
        return Err(AppError::InvalidConfig(
            "connection string is empty".to_string(),
        ));
    }

    if let Some(path) = connection.strip_prefix("file://") {
        return Ok(StorageEndpoint::Local(PathBuf::from(path)));
    }

    if connection.starts_with("http://") || connection.starts_with("https://") {
        let mut endpoint = Url::parse(connection)?;
        let credential = match endpoint.query() {
            Some(sas) if !sas.is_empty() => Credential::Sas(sas.to_string()),
            _ => Credential::Anonymous,
        };
        endpoint.set_query(None);
        return Ok(StorageEndpoint::Remote {
            endpoint,
            credential,
        });
    }

    let pairs = parse_pairs(connection)?;
    let get = |key: &str| lookup(&pairs, key);

    if let Some(root) = get("localroot") {
        return Ok(StorageEndpoint::Local(PathBuf::from(root)));
    }

    if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return Ok(StorageEndpoint::Remote {
            endpoint: Url::parse(kind.development_endpoint())?,
            credential: Credential::SharedKey(SharedKeyCredential::new(
                DEV_ACCOUNT,
                DEV_ACCOUNT_KEY,
            )?),
        });
    }

    let credential = match (get("sharedaccesssignature"), get("accountkey")) {
        (Some(sas), _) => Credential::Sas(sas.trim_start_matches('?').to_string()),
        (None, Some(key)) => Credential::SharedKey(SharedKeyCredential::new(
            get("accountname").unwrap_or_default(),
            key,
        )?),
        (None, None) => {
            return Err(AppError::InvalidConfig(
                "connection string has neither SharedAccessSignature nor AccountKey".to_string(),
            ))
        }
    };

    let endpoint = match (get(kind.endpoint_key()), get("accountname")) {
        (Some(endpoint), _) => Url::parse(endpoint)?,
        (None, Some(account)) => {
            let protocol = get("defaultendpointsprotocol").unwrap_or(DEFAULT_PROTOCOL);
            let suffix = get("endpointsuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
            Url::parse(&format!(
                "{protocol}://{account}.{}.{suffix}/",
                kind.host_label()
            ))?
        }
        (None, None) => {
            return Err(AppError::InvalidConfig(format!(
                "connection string has neither {} nor AccountName",
                kind.endpoint_key()
            )))
        }
    };

    Ok(StorageEndpoint::Remote {
        endpoint,
        credential,
    })
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn parse_pairs(connection: &str) -> AppResult<Vec<(String, String)>> {
    connection
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| {
                    AppError::InvalidConfig(format!(
                        "connection string segment '{part}' is not key=value"
                    ))
                })
        })
        .collect()
}
