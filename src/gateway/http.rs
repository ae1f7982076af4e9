use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{FieldTypeDefinition, PersistenceGateway};
use crate::config::GatewaySettings;
use crate::errors::SaveError;
use crate::field::PersistedField;

const USER_AGENT: &str = concat!("fieldsync/", env!("CARGO_PKG_VERSION"));

/// Upper bound on pages fetched by one list call.
const MAX_PAGES: usize = 100;

/// Keys whose messages are shown without a field prefix.
const GENERAL_ERROR_KEYS: &[&str] = &["detail", "non_field_errors", "error", "message"];

/// One page of a list endpoint. The API returns either a bare array or a
/// paginated envelope depending on the deployment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPage<T> {
    Paginated {
        results: Vec<T>,
        #[serde(default)]
        next: Option<String>,
    },
    Plain(Vec<T>),
}

/// REST client for the CRM field endpoints.
///
/// - `POST   {base}/fields/`
/// - `PATCH  {base}/fields/{id}/`
/// - `GET    {base}/fields/?pipeline={collection}`
/// - `GET    {base}/field-types/`
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    tenant: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, SaveError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            tenant: settings.tenant.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(tenant) = &self.tenant {
            builder = builder.header("X-Tenant", tenant);
        }
        builder
    }

    /// Resolve a `next` link against the base URL. Links to another origin
    /// are refused so credentials never leave the configured host.
    fn next_page_url(&self, next: &str) -> Result<Url, SaveError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| SaveError::Transport(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        let url = base
            .join(next)
            .map_err(|e| SaveError::Transport(format!("Invalid pagination link '{}': {}", next, e)))?;
        if url.origin() != base.origin() {
            return Err(SaveError::Transport(format!(
                "Refusing to follow pagination link to another origin: {}",
                url
            )));
        }
        Ok(url)
    }

    /// Follow `next` links until the last page, at most [`MAX_PAGES`] pages.
    async fn get_all<T: DeserializeOwned>(
        &self,
        first: RequestBuilder,
    ) -> Result<Vec<T>, SaveError> {
        let mut items = Vec::new();
        let mut page: ListPage<T> = decode(first.send().await?).await?;
        let mut fetched = 1;

        loop {
            match page {
                ListPage::Plain(batch) => {
                    items.extend(batch);
                    break;
                }
                ListPage::Paginated { results, next } => {
                    items.extend(results);
                    match next {
                        Some(next_url) => {
                            if fetched >= MAX_PAGES {
                                return Err(SaveError::Transport(format!(
                                    "Pagination did not end after {} pages",
                                    MAX_PAGES
                                )));
                            }
                            let url = self.next_page_url(&next_url)?;
                            page = decode(self.request(Method::GET, url.as_str()).send().await?).await?;
                            fetched += 1;
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(items)
    }
}

/// Map a response to a typed body or a `SaveError`.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SaveError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| SaveError::Transport(format!("Failed to parse response body: {}", e)));
    }

    let body = resp.text().await.unwrap_or_default();
    if is_validation_status(status) {
        let mut messages = flatten_error_body(&body);
        if messages.is_empty() {
            messages.push(format!("Request rejected with status {}", status.as_u16()));
        }
        Err(SaveError::ValidationRejected { messages })
    } else {
        Err(SaveError::Server {
            status: status.as_u16(),
            body,
        })
    }
}

fn is_validation_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

/// Flatten a DRF-style error body into display messages.
///
/// `{"name": ["Field with this name already exists."]}` becomes
/// `["name: Field with this name already exists."]`; general keys such as
/// `detail` and `non_field_errors` are kept unprefixed. Non-JSON bodies are
/// returned verbatim.
pub fn flatten_error_body(body: &str) -> Vec<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            let mut out = Vec::new();
            collect_messages(None, &value, &mut out);
            out
        }
        Err(_) => vec![trimmed.to_string()],
    }
}

fn collect_messages(prefix: Option<&str>, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(msg) => match prefix {
            Some(p) => out.push(format!("{}: {}", p, msg)),
            None => out.push(msg.clone()),
        },
        Value::Array(items) => {
            for item in items {
                collect_messages(prefix, item, out);
            }
        }
        Value::Object(map) => {
            for (key, inner) in map {
                if GENERAL_ERROR_KEYS.contains(&key.as_str()) {
                    collect_messages(prefix, inner, out);
                } else {
                    let nested = match prefix {
                        Some(p) => format!("{}.{}", p, key),
                        None => key.clone(),
                    };
                    collect_messages(Some(&nested), inner, out);
                }
            }
        }
        Value::Null => {}
        other => collect_messages(prefix, &Value::String(other.to_string()), out),
    }
}

#[async_trait]
impl PersistenceGateway for HttpGateway {
    async fn create(&self, collection: &str, payload: &Value) -> Result<PersistedField, SaveError> {
        let mut body = payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("pipeline".into(), Value::from(collection));
        }
        let resp = self
            .request(Method::POST, &self.url("fields/"))
            .json(&body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn update(&self, id: i64, payload: &Value) -> Result<PersistedField, SaveError> {
        let resp = self
            .request(Method::PATCH, &self.url(&format!("fields/{}/", id)))
            .json(payload)
            .send()
            .await?;
        decode(resp).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<PersistedField>, SaveError> {
        let first = self
            .request(Method::GET, &self.url("fields/"))
            .query(&[("pipeline", collection)]);
        self.get_all(first).await
    }

    async fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        let first = self.request(Method::GET, &self.url("field-types/"));
        self.get_all(first).await
    }
}
