//! Request helper for the task server. Every failure is surfaced as a
//! banner before it is handed back to the caller.

use crate::config::ApiConfig;
use crate::model::{Category, CategoryDraft, Status, Task, TaskDraft, TaskId, TaskStats};
use crate::notify::Notifications;
use crate::util::Tone;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP error! status: {status}")]
    Status { url: String, status: StatusCode },
    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Caller-supplied request settings. Headers given here win over the
/// default `Content-Type: application/json`.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        RequestOptions {
            method,
            ..Default::default()
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ApiError::Network {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(ApiClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Issues the request and returns the parsed JSON body. Non-2xx statuses
    /// count as failures.
    pub fn call(
        &self,
        path: &str,
        options: RequestOptions,
        notices: &mut Notifications,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        let result = self.send(&url, options);
        if let Err(err) = &result {
            error!(url = %url, error = %err, "API call failed");
            notices.push(GENERIC_FAILURE, Tone::Danger, Instant::now());
        }
        result
    }

    fn send(&self, url: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let headers = merge_headers(&options.headers)?;
        let mut request = self.http.request(options.method.clone(), url).headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }
        debug!(method = %options.method, url = %url, "sending request");
        let response = request.send().map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }
        let text = response.text().map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn call_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        notices: &mut Notifications,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let value = self.call(path, options, notices)?;
        serde_json::from_value(value).map_err(|source| {
            let err = ApiError::Decode { url, source };
            error!(error = %err, "API response did not match the expected shape");
            notices.push(GENERIC_FAILURE, Tone::Danger, Instant::now());
            err
        })
    }

    pub fn list_tasks(
        &self,
        status: Option<Status>,
        notices: &mut Notifications,
    ) -> Result<Vec<Task>, ApiError> {
        let path = match status {
            Some(s) => format!("/api/tasks?status={}", s.as_str()),
            None => "/api/tasks".to_string(),
        };
        self.call_as(&path, RequestOptions::default(), notices)
    }

    pub fn create_task(
        &self,
        draft: &TaskDraft,
        notices: &mut Notifications,
    ) -> Result<Task, ApiError> {
        let body = to_body(draft)?;
        self.call_as("/api/tasks", RequestOptions::new(Method::POST).json(body), notices)
    }

    pub fn update_task(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        notices: &mut Notifications,
    ) -> Result<Task, ApiError> {
        let body = to_body(draft)?;
        self.call_as(
            &format!("/api/tasks/{}", id),
            RequestOptions::new(Method::PUT).json(body),
            notices,
        )
    }

    pub fn delete_task(&self, id: TaskId, notices: &mut Notifications) -> Result<(), ApiError> {
        self.call(
            &format!("/api/tasks/{}", id),
            RequestOptions::new(Method::DELETE),
            notices,
        )
        .map(|_| ())
    }

    /// Advances the task one step: pending, in progress, completed, pending.
    pub fn toggle_task(&self, id: TaskId, notices: &mut Notifications) -> Result<Task, ApiError> {
        self.call_as(
            &format!("/api/tasks/{}/toggle", id),
            RequestOptions::new(Method::POST),
            notices,
        )
    }

    pub fn list_categories(&self, notices: &mut Notifications) -> Result<Vec<Category>, ApiError> {
        self.call_as("/api/categories", RequestOptions::default(), notices)
    }

    pub fn create_category(
        &self,
        draft: &CategoryDraft,
        notices: &mut Notifications,
    ) -> Result<Category, ApiError> {
        let body = to_body(draft)?;
        self.call_as(
            "/api/categories",
            RequestOptions::new(Method::POST).json(body),
            notices,
        )
    }

    pub fn stats(&self, notices: &mut Notifications) -> Result<TaskStats, ApiError> {
        self.call_as("/api/stats", RequestOptions::default(), notices)
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|source| ApiError::Decode {
        url: String::new(),
        source,
    })
}

fn merge_headers(extra: &[(String, String)]) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| ApiError::Header {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| ApiError::Header {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
