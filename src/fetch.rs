//! HTTP helper for requests to the Supabase APIs

use log::warn;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Value sent in the `X-Client-Info` header
pub const CLIENT_INFO: &str = concat!("importz/", env!("CARGO_PKG_VERSION"));

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    /// First header that could not be encoded; fails the request
    invalid_header: Option<String>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: &str, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("X-Client-Info", HeaderValue::from_static(CLIENT_INFO));

        Self {
            client,
            url: url.to_string(),
            method,
            headers,
            query_params: Vec::new(),
            body: None,
            timeout: None,
            invalid_header: None,
        }
    }

    /// Add a header to the request, replacing any previous value.
    ///
    /// A name or value that is not a valid header makes the request fail
    /// when it is executed.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                warn!("Invalid value for header {}", name);
                self.invalid_header.get_or_insert_with(|| name.to_string());
            }
        }
        self
    }

    /// Add the `apikey` header used by every Supabase service
    pub fn api_key(self, key: &str) -> Self {
        self.header("apikey", key)
    }

    /// Add bearer token authentication to the request
    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    /// Append query parameters, keeping their order
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Limit how long the request may take
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the request
    fn build(&self) -> Result<RequestBuilder> {
        if let Some(name) = &self.invalid_header {
            return Err(Error::general(format!("Invalid value for header {}", name)));
        }

        let mut url = Url::parse(&self.url)?;

        if !self.query_params.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                query_pairs.append_pair(key, value);
            }
        }

        let mut req = self
            .client
            .request(self.method.clone(), url.as_str())
            .headers(self.headers.clone());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T> {
        let response = self.execute_checked().await?;
        Ok(response.json::<T>().await?)
    }

    /// Execute the request, turning non-success statuses into errors
    pub async fn execute_checked(&self) -> Result<Response> {
        let response = self.build()?.send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(error_from_response(response).await)
    }
}

/// Decode an unsuccessful response into an [`Error`]
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return Error::Http(e),
    };

    match serde_json::from_str::<PostgrestErrorBody>(&text) {
        Ok(PostgrestErrorBody {
            code: Some(code),
            message,
            details,
            hint,
        }) => Error::Postgrest {
            status: status.as_u16(),
            code,
            message: message.unwrap_or_default(),
            details,
            hint,
        },
        _ => Error::general(format!("Request failed with status {}: {}", status, text)),
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::GET)
    }

    /// Create a POST request
    pub fn post<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::POST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_headers_and_ordered_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/encargos"))
            .and(header("apikey", "anon"))
            .and(header("Authorization", "Bearer token"))
            .and(header("X-Client-Info", CLIENT_INFO))
            .and(query_param("select", "*"))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "e1" }])))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = format!("{}/rest/v1/encargos", mock_server.uri());
        let rows: Vec<serde_json::Value> = Fetch::get(&client, &url)
            .api_key("anon")
            .bearer_auth("token")
            .query([("select", "*"), ("order", "created_at.desc")])
            .execute()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "e1");
    }

    #[tokio::test]
    async fn invalid_header_fails_without_sending() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "U1" })))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = format!("{}/auth/v1/user", mock_server.uri());
        let err = Fetch::get(&client, &url)
            .api_key("anon")
            .bearer_auth("bad\ntoken")
            .execute::<serde_json::Value>()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::General(ref msg) if msg.contains("Authorization")));
    }

    #[tokio::test]
    async fn decodes_postgrest_error_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            })))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = format!("{}/rest/v1/profiles", mock_server.uri());
        let err = Fetch::get(&client, &url)
            .execute::<serde_json::Value>()
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        match err {
            Error::Postgrest { status, details, .. } => {
                assert_eq!(status, 406);
                assert_eq!(details.as_deref(), Some("The result contains 0 rows"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_text_failure_is_a_general_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = format!("{}/auth/v1/logout", mock_server.uri());
        let err = Fetch::post(&client, &url).execute_checked().await.unwrap_err();

        assert!(matches!(err, Error::General(ref msg) if msg.contains("500") && msg.contains("boom")));
    }
}
