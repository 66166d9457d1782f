//! reqwest-backed Georef API client

use super::api::GeorefApi;
use super::models::{
    best_results, AddressMatches, AddressQuery, ApiResult, BulkAddressRequest,
    BulkAddressResponse, CollectionPage, FetchTask, NameQuery, PointQuery,
};
use crate::config::{ApiConfig, SecretString};
use crate::domain::{ApiError, EntityType, GeorefError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const QUOTA_HEADER_PREFIX: &str = "x-ratelimit-";

/// HTTP client for one Georef deployment
///
/// # Example
///
/// ```no_run
/// use georef::adapters::georef::GeorefClient;
/// use georef::config::ApiConfig;
///
/// # fn example() -> georef::domain::Result<()> {
/// let config = ApiConfig::default().with_base_url("http://localhost:5000/api/");
/// let client = GeorefClient::new(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct GeorefClient {
    base_url: String,
    client: Client,
    /// Only set for the hosted deployment
    token: Option<SecretString>,
}

impl GeorefClient {
    /// Create a client from connection settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("georef/", env!("CARGO_PKG_VERSION")));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            GeorefError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let token = if config.is_hosted() {
            config.token.clone()
        } else {
            if config.token.is_some() {
                tracing::debug!(
                    base_url = %config.base_url,
                    "Token ignored for non-hosted deployment"
                );
            }
            None
        };

        Ok(Self {
            base_url: crate::config::schema::normalize_base_url(config.base_url.clone()),
            client,
            token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Send a request and map transport failures and non-2xx statuses
    async fn send(&self, request: RequestBuilder, descriptor: &str) -> ApiResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(e, descriptor))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body, descriptor))
    }

    async fn read_json<T: DeserializeOwned>(response: Response, descriptor: &str) -> ApiResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                request: descriptor.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl GeorefApi for GeorefClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, task: &FetchTask) -> ApiResult<CollectionPage> {
        let descriptor = task.descriptor();
        tracing::trace!(base_url = %self.base_url, request = %descriptor, "GET");

        let request = self
            .client
            .get(self.url(task.entity.endpoint()))
            .query(&task.query_pairs());
        let response = self.send(request, &descriptor).await?;
        let body: Value = Self::read_json(response, &descriptor).await?;

        CollectionPage::from_body(task.entity, body, &descriptor)
    }

    async fn quota_headers(&self) -> ApiResult<HashMap<String, String>> {
        let task = FetchTask::count(EntityType::Provinces, Default::default());
        let descriptor = task.descriptor();

        let request = self
            .client
            .get(self.url(task.entity.endpoint()))
            .query(&task.query_pairs());
        let response = self.send(request, &descriptor).await?;

        Ok(response
            .headers()
            .iter()
            .filter(|(name, _)| name.as_str().starts_with(QUOTA_HEADER_PREFIX))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.trim().to_string()))
            })
            .collect())
    }

    async fn normalize_bulk(&self, queries: &[AddressQuery]) -> ApiResult<Vec<AddressMatches>> {
        let descriptor = format!("POST direcciones[{}]", queries.len());

        let request = self
            .client
            .post(self.url("direcciones"))
            .json(&BulkAddressRequest {
                direcciones: queries,
            });
        let response = self.send(request, &descriptor).await?;
        let body: BulkAddressResponse = Self::read_json(response, &descriptor).await?;

        Ok(body.resultados)
    }

    async fn normalize_one(&self, query: &AddressQuery) -> ApiResult<AddressMatches> {
        let descriptor = format!("direcciones?direccion={}", query.direccion);

        let request = self
            .client
            .get(self.url("direcciones"))
            .query(&query.query_pairs());
        let response = self.send(request, &descriptor).await?;

        Self::read_json(response, &descriptor).await
    }

    async fn similar_bulk(
        &self,
        entity: EntityType,
        queries: &[NameQuery],
    ) -> ApiResult<Vec<Option<Value>>> {
        let descriptor = format!("POST {}[{}]", entity.endpoint(), queries.len());
        let body = HashMap::from([(entity.collection_key(), queries)]);

        let request = self.client.post(self.url(entity.endpoint())).json(&body);
        let response = self.send(request, &descriptor).await?;
        let body: Value = Self::read_json(response, &descriptor).await?;

        best_results(body, entity.collection_key(), &descriptor)
    }

    async fn locate_bulk(&self, points: &[PointQuery]) -> ApiResult<Vec<Option<Value>>> {
        let descriptor = format!("POST ubicacion[{}]", points.len());
        let body = HashMap::from([("ubicaciones", points)]);

        let request = self.client.post(self.url("ubicacion")).json(&body);
        let response = self.send(request, &descriptor).await?;
        let body: Value = Self::read_json(response, &descriptor).await?;

        best_results(body, "ubicacion", &descriptor)
    }
}

fn transport_error(err: reqwest::Error, descriptor: &str) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            request: descriptor.to_string(),
        }
    } else {
        ApiError::ConnectionFailed {
            request: descriptor.to_string(),
            message: err.to_string(),
        }
    }
}

fn status_error(status: StatusCode, body: String, descriptor: &str) -> ApiError {
    let request = descriptor.to_string();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        body
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { request },
        s if s.is_client_error() => ApiError::ClientError {
            request,
            status: s.as_u16(),
            message,
        },
        s if s.is_server_error() => ApiError::ServerError {
            request,
            status: s.as_u16(),
            message,
        },
        s => ApiError::InvalidResponse {
            request,
            message: format!("unexpected status {s}"),
        },
    }
}
