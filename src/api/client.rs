//! HTTP client for the brokerage REST backend.
//!
//! Every read takes a `CancellationToken`; cancelling it settles the
//! request with `ApiError::Cancelled` instead of waiting on the transport.

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;

use super::ApiError;

/// API client for the brokerage backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base_url = Self::parse_base_url(&config.url)?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| eyre!("Invalid API url {}: {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!("API url must be http or https: {}", raw));
    }
    Ok(url)
  }

  /// Build `<base>/<segments...>`, keeping a trailing slash when the last segment is empty.
  fn url_for(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    debug!(method = %method, url = %url, "Sending request");
    let builder = self.client.request(method, url);
    match self.token {
      Some(ref token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// Send the request, mapping non-2xx statuses to `ApiError`.
  async fn send_accepted(builder: RequestBuilder) -> Result<Accepted, ApiError> {
    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
      return Err(ApiError::from_status(status, &text));
    }
    Ok(Accepted { text })
  }

  /// Send the request and decode a JSON body.
  async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
    Self::send_accepted(builder).await?.decode()
  }

  /// Race the request against the token. The losing future is dropped, which aborts it.
  async fn send_cancellable<T: DeserializeOwned>(
    builder: RequestBuilder,
    cancel: &CancellationToken,
  ) -> Result<T, ApiError> {
    if cancel.is_cancelled() {
      return Err(ApiError::Cancelled);
    }
    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        debug!("Request cancelled");
        Err(ApiError::Cancelled)
      }
      result = Self::send(builder) => result,
    }
  }

  /// GET `<base>/<segments...>` with optional query parameters.
  pub async fn get<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    query: &[(String, String)],
    cancel: &CancellationToken,
  ) -> Result<T, ApiError> {
    let mut url = self.url_for(segments)?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Self::send_cancellable(self.request(Method::GET, url), cancel).await
  }

  /// GET the collection at `<base>/<resource>/`.
  pub async fn list<T: DeserializeOwned>(
    &self,
    resource: &str,
    query: &[(String, String)],
    cancel: &CancellationToken,
  ) -> Result<T, ApiError> {
    self.get(&[resource, ""], query, cancel).await
  }

  /// GET `<base>/<resource>/<id>`.
  pub async fn fetch<T: DeserializeOwned>(
    &self,
    resource: &str,
    id: &str,
    cancel: &CancellationToken,
  ) -> Result<T, ApiError> {
    self.get(&[resource, id], &[], cancel).await
  }

  /// POST a new record to `<base>/<resource>/`.
  ///
  /// Mutations resolve once the backend accepts them; decoding the body is
  /// a separate step so callers can react to the write itself.
  pub async fn create<B: Serialize + ?Sized>(
    &self,
    resource: &str,
    body: &B,
  ) -> Result<Accepted, ApiError> {
    let url = self.url_for(&[resource, ""])?;
    Self::send_accepted(self.request(Method::POST, url).json(body)).await
  }

  /// PUT a record at `<base>/<resource>/<id>`.
  pub async fn update<B: Serialize + ?Sized>(
    &self,
    resource: &str,
    id: &str,
    body: &B,
  ) -> Result<Accepted, ApiError> {
    let url = self.url_for(&[resource, id])?;
    Self::send_accepted(self.request(Method::PUT, url).json(body)).await
  }

  /// DELETE the record at `<base>/<resource>/<id>`.
  pub async fn delete(&self, resource: &str, id: &str) -> Result<Accepted, ApiError> {
    let url = self.url_for(&[resource, id])?;
    Self::send_accepted(self.request(Method::DELETE, url)).await
  }
}

/// Body of a 2xx response, not yet decoded.
#[derive(Debug, Clone)]
pub struct Accepted {
  text: String,
}

impl Accepted {
  /// Decode the body as JSON. An empty body decodes as `null`.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
    // DELETE endpoints may answer with an empty body
    let body = if self.text.trim().is_empty() { "null" } else { &self.text };
    serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Value};
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer, token: Option<&str>) -> ApiClient {
    let config = ApiConfig {
      url: format!("{}/api", server.uri()),
      timeout_secs: 5,
    };
    ApiClient::new(&config, token.map(String::from)).unwrap()
  }

  #[test]
  fn test_url_for_keeps_trailing_slash() {
    let config = ApiConfig {
      url: "http://127.0.0.1:8000/api/".to_string(),
      timeout_secs: 5,
    };
    let client = ApiClient::new(&config, None).unwrap();

    let list = client.url_for(&["roles", ""]).unwrap();
    assert_eq!(list.as_str(), "http://127.0.0.1:8000/api/roles/");

    let item = client.url_for(&["propietarios", "123 45"]).unwrap();
    assert_eq!(item.as_str(), "http://127.0.0.1:8000/api/propietarios/123%2045");
  }

  #[test]
  fn test_rejects_non_http_base() {
    let config = ApiConfig {
      url: "ftp://example.com/api".to_string(),
      timeout_secs: 5,
    };
    assert!(ApiClient::new(&config, None).is_err());
  }

  #[tokio::test]
  async fn test_list_sends_bearer_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/citas-visita/"))
      .and(query_param("estado", "pendiente"))
      .and(header("authorization", "Bearer secret"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id_cita": 7}])))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server, Some("secret"));
    let query = vec![("estado".to_string(), "pendiente".to_string())];
    let citas: Value = client
      .list("citas-visita", &query, &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(citas, json!([{"id_cita": 7}]));
  }

  #[tokio::test]
  async fn test_error_status_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/roles/"))
      .and(body_json(json!({"nombre_rol": "Admin"})))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "El rol ya existe"})))
      .mount(&server)
      .await;

    let client = client_for(&server, None);
    let err = client
      .create("roles", &json!({"nombre_rol": "Admin"}))
      .await
      .unwrap_err();

    assert_eq!(err.detail(), Some("El rol ya existe"));
  }

  #[tokio::test]
  async fn test_delete_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/propiedades/3"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let client = client_for(&server, None);
    let body: Value = client.delete("propiedades", "3").await.unwrap().decode().unwrap();
    assert_eq!(body, Value::Null);
  }

  #[tokio::test]
  async fn test_accepted_write_with_plain_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/roles/1"))
      .respond_with(ResponseTemplate::new(200).set_body_string("Rol eliminado"))
      .mount(&server)
      .await;

    let client = client_for(&server, None);
    let accepted = client.delete("roles", "1").await.unwrap();
    assert!(matches!(
      accepted.decode::<Value>(),
      Err(ApiError::InvalidResponse(_))
    ));
  }

  #[tokio::test]
  async fn test_cancel_settles_with_cancelled_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/roles/"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!([]))
          .set_delay(Duration::from_secs(5)),
      )
      .mount(&server)
      .await;

    let client = client_for(&server, None);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      canceller.cancel();
    });

    let err = client
      .list::<Value>("roles", &[], &token)
      .await
      .unwrap_err();
    assert!(err.is_cancelled());
  }

  #[tokio::test]
  async fn test_already_cancelled_token_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(0)
      .mount(&server)
      .await;

    let client = client_for(&server, None);
    let token = CancellationToken::new();
    token.cancel();

    let err = client.list::<Value>("roles", &[], &token).await.unwrap_err();
    assert!(err.is_cancelled());
  }
}
