use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CHILDREN_SUFFIX: &str = ":/children";
const ROOT_MARKER: &str = "/root:";
const UPLOAD_DESCRIPTION: &str = "Workspace backup archive.";
const CREATE_FOLDER_ACCEPT: &str =
    "application/json;odata.metadata=minimal;odata.streaming=true;IEEE754Compatible=false;charset=utf-8";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("endpoint is not a children listing url: {0}")]
    Endpoint(String),
    #[error("folder lookup returned an empty id")]
    EmptyFolderId,
    #[error("upload session response did not include an upload url")]
    MissingUploadUrl,
}

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    // Children collection of the target folder.
    listing_url: Url,
    // The folder item itself, for id resolution.
    folder_url: Url,
    // Drive base, for item-addressed operations.
    drive_url: Url,
    token: String,
}

impl GraphClient {
    /// Builds a client from the configured children-listing endpoint,
    /// e.g. `https://graph.microsoft.com/v1.0/sites/<site>/drive/root:/Backups:/children`.
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, GraphError> {
        let trimmed = endpoint.trim_end_matches('/');
        let folder = trimmed
            .strip_suffix(CHILDREN_SUFFIX)
            .ok_or_else(|| GraphError::Endpoint(endpoint.to_string()))?;
        let drive = folder
            .split_once(ROOT_MARKER)
            .map(|(base, _)| base)
            .ok_or_else(|| GraphError::Endpoint(endpoint.to_string()))?;
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            listing_url: Url::parse(trimmed)?,
            folder_url: Url::parse(folder)?,
            drive_url: Url::parse(drive)?,
            token: token.into(),
        })
    }

    /// Resolves the target folder to its drive item id. An empty id in a
    /// success body is a hard failure, the same as an error status.
    pub async fn resolve_folder(&self) -> Result<String, GraphError> {
        let response = self
            .http
            .get(self.folder_url.clone())
            .header("Authorization", self.auth_header_value())
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let item: ItemResponse = Self::handle_response(response).await?;
        if item.id.is_empty() {
            return Err(GraphError::EmptyFolderId);
        }
        Ok(item.id)
    }

    pub async fn list_children(&self) -> Result<Vec<DriveItem>, GraphError> {
        let response = self
            .http
            .get(self.listing_url.clone())
            .header("Authorization", self.auth_header_value())
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let listing: ChildrenResponse = Self::handle_response(response).await?;
        Ok(listing.value)
    }

    pub async fn check_folder(&self, name: &str) -> Result<bool, GraphError> {
        let children = self.list_children().await?;
        Ok(children
            .iter()
            .any(|item| item.name.eq_ignore_ascii_case(name)))
    }

    pub async fn create_folder(&self, name: &str) -> Result<(), GraphError> {
        let payload = CreateFolderRequest {
            name,
            folder: Empty {},
            conflict_behavior: "rename",
        };
        let response = self
            .http
            .post(self.listing_url.clone())
            .header("Accept", CREATE_FOLDER_ACCEPT)
            .header("Authorization", self.auth_header_value())
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
        ) {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Api { status, body });
        }
        Ok(())
    }

    /// Negotiates a single-use upload session for the named file in the
    /// given folder, replacing any same-named item.
    pub async fn create_upload_session(
        &self,
        folder_id: &str,
        file_name: &str,
    ) -> Result<UploadSession, GraphError> {
        let url = Url::parse(&format!(
            "{}/items/{folder_id}:/{file_name}:/createUploadSession",
            self.drive_url.as_str().trim_end_matches('/'),
        ))?;
        let payload = CreateSessionRequest {
            conflict_behavior: "replace",
            description: UPLOAD_DESCRIPTION,
            file_system_info: FileSystemInfo {
                odata_type: "microsoft.graph.fileSystemInfo",
            },
            name: file_name,
        };
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Api { status, body });
        }
        let session: UploadSessionResponse = response.json().await?;
        if session.upload_url.is_empty() {
            return Err(GraphError::MissingUploadUrl);
        }
        Ok(UploadSession {
            upload_url: Url::parse(&session.upload_url)?,
        })
    }

    /// Deletes a drive item. Success is exactly 204.
    pub async fn delete_item(&self, item_id: &str) -> Result<(), GraphError> {
        let url = Url::parse(&format!(
            "{}/items/{item_id}",
            self.drive_url.as_str().trim_end_matches('/'),
        ))?;
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Api { status, body });
        }
        Ok(())
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GraphError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(GraphError::Api { status, body })
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "createdDateTime")]
    pub created: Option<String>,
}

#[derive(Debug)]
pub struct UploadSession {
    pub upload_url: Url,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    value: Vec<DriveItem>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadSessionResponse {
    #[serde(default, rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct CreateFolderRequest<'a> {
    name: &'a str,
    folder: Empty,
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    conflict_behavior: &'a str,
}

#[derive(Serialize)]
struct FileSystemInfo<'a> {
    #[serde(rename = "@odata.type")]
    odata_type: &'a str,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    conflict_behavior: &'a str,
    description: &'a str,
    #[serde(rename = "fileSystemInfo")]
    file_system_info: FileSystemInfo<'a>,
    name: &'a str,
}
