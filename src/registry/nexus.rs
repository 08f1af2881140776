//! Nexus Repository Manager REST client
//!
//! Talks to the `service/rest/v1` API for listing, search and component
//! upload, follows `continuationToken` pagination transparently, and delegates
//! docker images to [`DockerTransport`].

use super::{AssetData, AssetQuery, ComponentData, DockerTransport, Page, RegistryClient, RepositoryData};
use crate::artifact::ArtifactKind;
use crate::config::ConnectionConfig;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;

const REPOSITORIES_PATH: &str = "service/rest/v1/repositories";
const COMPONENTS_PATH: &str = "service/rest/v1/components";
const SEARCH_ASSETS_PATH: &str = "service/rest/v1/search/assets";
const WRITABLE_PATH: &str = "service/rest/v1/status/writable";

pub struct NexusClientBuilder {
    address: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<u64>,
    skip_tls: bool,
    docker: DockerTransport,
}

impl NexusClientBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            timeout: None,
            skip_tls: false,
            docker: DockerTransport::default(),
        }
    }

    /// Builder populated from a connection config, docker endpoints included
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.url.clone())
            .with_credentials(config.username.clone(), config.password.clone())
            .with_timeout(config.timeout)
            .with_skip_tls(config.skip_tls)
            .with_docker(
                DockerTransport::new(config.docker_pull_url.clone(), config.docker_push_url.clone())
                    .with_credentials(config.username.clone(), config.password.clone()),
            )
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_docker(mut self, docker: DockerTransport) -> Self {
        self.docker = docker;
        self
    }

    pub fn build(self) -> Result<NexusClient> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if self.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder.build().map_err(SyncError::Network)?;

        Ok(NexusClient {
            client,
            base: base_url(&self.address)?,
            username: self.username,
            password: self.password,
            docker: self.docker,
        })
    }
}

pub struct NexusClient {
    client: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
    docker: DockerTransport,
}

impl NexusClient {
    pub fn builder(address: impl Into<String>) -> NexusClientBuilder {
        NexusClientBuilder::new(address)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn check(response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(HttpErrorHandler::handle_registry_error(status, &error_text, operation))
    }

    /// GET every page of a listing endpoint
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = self.endpoint(path)?;
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
                if let Some(token) = &continuation {
                    query.append_pair("continuationToken", token);
                }
            }

            let response = self.request(Method::GET, url).send().await?;
            let page: Page<T> = Self::check(response, operation).await?.json().await?;
            items.extend(page.items);

            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl RegistryClient for NexusClient {
    async fn list_repositories(&self) -> Result<Vec<RepositoryData>> {
        let url = self.endpoint(REPOSITORIES_PATH)?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(Self::check(response, "List repositories").await?.json().await?)
    }

    async fn list_components(&self, repository: &str) -> Result<Vec<ComponentData>> {
        self.get_paginated(
            COMPONENTS_PATH,
            &[("repository", repository.to_string())],
            &format!("List components of {}", repository),
        )
        .await
    }

    async fn search_assets(&self, query: &AssetQuery) -> Result<Vec<AssetData>> {
        self.get_paginated(SEARCH_ASSETS_PATH, &query.params(), "Search assets")
            .await
    }

    async fn fetch_size(&self, download_url: &str) -> Result<u64> {
        let url = Url::parse(download_url)?;
        let response = self.request(Method::HEAD, url).send().await?;
        let response = Self::check(response, "Fetch asset size").await?;

        // HEAD has no body, so the size comes from the header itself
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    async fn is_writable(&self) -> Result<bool> {
        let url = self.endpoint(WRITABLE_PATH)?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(response.status().is_success())
    }

    async fn download_asset(&self, download_url: &str, destination: &Path) -> Result<()> {
        let url = Url::parse(download_url)?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                &format!("Download of {}", download_url),
            ));
        }

        let partial = partial_path(destination);
        if let Err(e) = write_body(response, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| SyncError::io(destination, e))
    }

    async fn upload_component(&self, repository: &str, kind: &ArtifactKind, file: &Path) -> Result<()> {
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| SyncError::Transfer(format!("No file name in {}", file.display())))?
            .to_string();
        let fields = component_fields(kind, &file_name)?;
        let handle = tokio::fs::File::open(file)
            .await
            .map_err(|e| SyncError::io(file, e))?;
        let length = handle
            .metadata()
            .await
            .map_err(|e| SyncError::io(file, e))?
            .len();
        let body = Body::wrap_stream(ReaderStream::new(handle));

        let mut form = Form::new().part(
            fields.asset_field.clone(),
            Part::stream_with_length(body, length).file_name(file_name),
        );
        for (key, value) in fields.text {
            form = form.text(key, value);
        }

        let mut url = self.endpoint(COMPONENTS_PATH)?;
        url.query_pairs_mut().append_pair("repository", repository);

        let response = self.request(Method::POST, url).multipart(form).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                &format!("Upload to {}", repository),
            ))
        }
    }

    async fn download_docker_image(&self, image: &str, tag: &str) -> Result<()> {
        self.docker.pull(image, tag).await
    }

    async fn upload_docker_image(&self, image: &str, tag: &str) -> Result<()> {
        self.docker.push(image, tag).await
    }
}

/// Stream a response body into `path`
async fn write_body(mut response: Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| SyncError::io(path, e))?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| SyncError::io(path, e))?;
    }
    file.flush().await.map_err(|e| SyncError::io(path, e))
}

/// Multipart layout of a component upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFields {
    /// Form field carrying the file itself
    pub asset_field: String,
    pub text: Vec<(String, String)>,
}

/// Form fields the components endpoint expects for `kind`
pub fn component_fields(kind: &ArtifactKind, file_name: &str) -> Result<ComponentFields> {
    let fields = match kind {
        ArtifactKind::Docker { .. } => {
            return Err(SyncError::Transfer(
                "docker images are pushed through the docker transport".to_string(),
            ));
        }
        ArtifactKind::Maven {
            group_id,
            artifact_id,
            version,
        } => ComponentFields {
            asset_field: "maven2.asset1".to_string(),
            text: vec![
                ("maven2.groupId".to_string(), group_id.clone()),
                ("maven2.artifactId".to_string(), artifact_id.clone()),
                ("maven2.version".to_string(), version.clone()),
                ("maven2.asset1.extension".to_string(), maven_extension(file_name)),
            ],
        },
        ArtifactKind::Raw { directory } => ComponentFields {
            asset_field: "raw.asset1".to_string(),
            text: vec![
                ("raw.directory".to_string(), directory.clone()),
                ("raw.asset1.filename".to_string(), file_name.to_string()),
            ],
        },
        ArtifactKind::Yum { directory } => ComponentFields {
            asset_field: "yum.asset".to_string(),
            text: vec![
                ("yum.directory".to_string(), directory.clone()),
                ("yum.asset.filename".to_string(), file_name.to_string()),
            ],
        },
        ArtifactKind::Npm => single_asset("npm.asset"),
        ArtifactKind::Pypi => single_asset("pypi.asset"),
        ArtifactKind::Rubygems => single_asset("rubygems.asset"),
    };
    Ok(fields)
}

fn single_asset(field: &str) -> ComponentFields {
    ComponentFields {
        asset_field: field.to_string(),
        text: Vec::new(),
    }
}

/// Extension of a maven file name: `lib-1.0.tar.gz` gives `tar.gz`,
/// `lib-1.0-sources.jar` gives `jar`.
fn maven_extension(file_name: &str) -> String {
    let tail = file_name.rsplit('-').next().unwrap_or(file_name);
    let after_version = tail.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    if after_version.len() < tail.len() {
        return after_version.to_string();
    }
    match tail.split_once('.') {
        Some((_, extension)) => extension.to_string(),
        None => String::new(),
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

/// Parse the registry address and make sure relative joins land under it
fn base_url(address: &str) -> Result<Url> {
    let mut url = Url::parse(address)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
