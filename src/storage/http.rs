use super::connection::Credential;
use super::shared_key::{request_date, BlobRequest};
use super::{validate_table_key, BlobStore, TableStore};
use crate::constants::STORAGE_API_VERSION;
use crate::errors::{AppError, AppResult};
use crate::models::TableRow;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{RequestBuilder, StatusCode};
use tracing::debug;
use url::Url;

const BLOB_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const TABLE_CONTENT_TYPE: &str = "application/json";

/// Appends path segments to `endpoint` and attaches the SAS query string.
fn resource_url(endpoint: &Url, segments: &[&str], sas: Option<&str>) -> AppResult<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| {
            AppError::InvalidConfig(format!("endpoint '{endpoint}' cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(segments);
    url.set_query(sas);
    Ok(url)
}

/// Blob container reached over the blob service REST API.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    container_url: Url,
    credential: Credential,
}

impl HttpBlobStore {
    pub fn new(
        client: reqwest::Client,
        endpoint: &Url,
        container: &str,
        credential: Credential,
    ) -> AppResult<Self> {
        let container_url = resource_url(endpoint, &[container], None)?;
        Ok(Self {
            client,
            container_url,
            credential,
        })
    }

    /// Full URL of a blob, SAS included. `/` in the name separates virtual
    /// directories.
    pub fn blob_url(&self, name: &str) -> AppResult<Url> {
        let segments: Vec<&str> = name.split('/').collect();
        resource_url(&self.container_url, &segments, self.credential.sas())
    }

    /// Adds the version and date headers, and a Shared Key signature when the
    /// credential is an account key.
    fn prepare(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &Url,
        body: Option<(usize, &str)>,
        overwrite: bool,
    ) -> AppResult<RequestBuilder> {
        let date = request_date();
        let mut request = request
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", &date);

        let is_put = body.is_some();
        let (content_length, content_type) = body.unwrap_or((0, ""));
        if is_put {
            request = request
                .header("x-ms-blob-type", "BlockBlob")
                .header(CONTENT_TYPE, content_type);
        }
        let if_none_match = if is_put && !overwrite { "*" } else { "" };
        if !if_none_match.is_empty() {
            request = request.header(IF_NONE_MATCH, if_none_match);
        }

        if let Credential::SharedKey(key) = &self.credential {
            let mut ms_headers = vec![
                ("x-ms-date", date.as_str()),
                ("x-ms-version", STORAGE_API_VERSION),
            ];
            if is_put {
                ms_headers.push(("x-ms-blob-type", "BlockBlob"));
            }
            let authorization = key.sign_blob(&BlobRequest {
                method,
                url,
                content_length,
                content_type,
                if_none_match,
                ms_headers: &ms_headers,
            })?;
            request = request.header(AUTHORIZATION, authorization);
        }
        Ok(request)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn read_text(&self, name: &str) -> AppResult<String> {
        let url = self
            .blob_url(name)
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
        let response = self
            .prepare(self.client.get(url.clone()), "GET", &url, None, false)
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("GET blob '{name}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "GET blob '{name}' returned {status}"
            )));
        }
        response
            .text()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("reading blob '{name}': {e}")))
    }

    async fn upload(&self, name: &str, body: &str, overwrite: bool) -> AppResult<()> {
        let url = self.blob_url(name)?;
        let request = self.prepare(
            self.client.put(url.clone()),
            "PUT",
            &url,
            Some((body.len(), BLOB_CONTENT_TYPE)),
            overwrite,
        )?;

        let response = request
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| AppError::SinkUnavailable(format!("PUT blob '{name}': {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(blob = name, status = status.as_u16(), "Uploaded blob");
            return Ok(());
        }
        let reason = match status {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED if !overwrite => {
                "blob already exists".to_string()
            }
            _ => response.text().await.unwrap_or_default(),
        };
        Err(AppError::SinkUnavailable(format!(
            "PUT blob '{name}' returned {status}: {reason}"
        )))
    }
}

/// Table reached over the table service REST API.
#[derive(Debug, Clone)]
pub struct HttpTableStore {
    client: reqwest::Client,
    table_url: Url,
    credential: Credential,
}

impl HttpTableStore {
    pub fn new(
        client: reqwest::Client,
        endpoint: &Url,
        table: &str,
        credential: Credential,
    ) -> AppResult<Self> {
        let table_url = resource_url(endpoint, &[table], credential.sas())?;
        Ok(Self {
            client,
            table_url,
            credential,
        })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn create_entity(&self, row: &TableRow) -> AppResult<()> {
        validate_table_key(&row.partition_key)?;
        validate_table_key(&row.row_key)?;

        let body = serde_json::to_string(row)
            .map_err(|e| AppError::SinkUnavailable(format!("Failed to encode row: {e}")))?;

        let date = request_date();
        let mut request = self
            .client
            .post(self.table_url.clone())
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", &date)
            .header("DataServiceVersion", "3.0;NetFx")
            .header("MaxDataServiceVersion", "3.0;NetFx")
            .header("Prefer", "return-no-content")
            .header(ACCEPT, "application/json;odata=nometadata")
            .header(CONTENT_TYPE, TABLE_CONTENT_TYPE);
        if let Credential::SharedKey(key) = &self.credential {
            let authorization =
                key.sign_table("POST", TABLE_CONTENT_TYPE, &date, &self.table_url)?;
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.body(body).send().await.map_err(|e| {
            AppError::SinkUnavailable(format!(
                "insert {}/{}: {e}",
                row.partition_key, row.row_key
            ))
        })?;

        match response.status() {
            status if status.is_success() => {
                debug!(
                    partition = %row.partition_key,
                    row = %row.row_key,
                    status = status.as_u16(),
                    "Inserted table entity"
                );
                Ok(())
            }
            StatusCode::CONFLICT => Err(AppError::DuplicateKey {
                partition: row.partition_key.clone(),
                row: row.row_key.clone(),
            }),
            status => {
                let detail = response.text().await.unwrap_or_default();
                Err(AppError::SinkUnavailable(format!(
                    "insert {}/{} returned {status}: {detail}",
                    row.partition_key, row.row_key
                )))
            }
        }
    }
}
