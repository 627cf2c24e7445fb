use crate::error::RemoteError;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.beeminder.com/api/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 1_000;
const DUPLICATE_REQUEST_MARKER: &str = "duplicate request";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiDatapoint {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub daystamp: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ApiDatapoint {
    /// Ids are strings on Beeminder; numbers are accepted for older payloads.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeeminderClient {
    http: Client,
    api_base: String,
    username: String,
    auth_token: Option<String>,
}

fn truncate_body(body: &str) -> String {
    let clean: String = body.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > MAX_ERROR_BODY_CHARS {
        let mut s: String = clean.chars().take(MAX_ERROR_BODY_CHARS).collect();
        s.push('…');
        s
    } else {
        clean
    }
}

pub fn classify_status(status: StatusCode, what: &str, body: &str) -> RemoteError {
    let message = format!("{what} -> {status}: {}", truncate_body(body));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RemoteError::Transient(message)
    } else {
        RemoteError::Permanent(message)
    }
}

fn classify_transport(err: reqwest::Error, what: &str) -> RemoteError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RemoteError::Transient(format!("{what}: {err}"))
    } else {
        RemoteError::Permanent(format!("{what}: {err}"))
    }
}

pub fn is_duplicate_request(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNPROCESSABLE_ENTITY
        && body.to_ascii_lowercase().contains(DUPLICATE_REQUEST_MARKER)
}

impl BeeminderClient {
    pub fn new(api_base: &str, username: &str, auth_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build beeminder http client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            username: username.to_string(),
            auth_token,
        })
    }

    fn datapoints_url(&self, goal: &str) -> String {
        format!(
            "{}/users/{}/goals/{}/datapoints.json",
            self.api_base, self.username, goal
        )
    }

    fn datapoint_url(&self, goal: &str, id: &str) -> String {
        format!(
            "{}/users/{}/goals/{}/datapoints/{}.json",
            self.api_base, self.username, goal, id
        )
    }

    fn with_token_query(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.query(&[("auth_token", token.as_str())]),
            None => req,
        }
    }

    fn token_form(&self, mut form: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.auth_token {
            form.insert(0, ("auth_token", token.clone()));
        }
        form
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
        req.send().map_err(|err| classify_transport(err, what))
    }

    fn expect_success(&self, resp: Response, what: &str) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(classify_status(status, what, &body))
    }

    pub fn fetch_datapoints(&self, goal: &str) -> Result<Vec<ApiDatapoint>, RemoteError> {
        let url = self.datapoints_url(goal);
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let what = format!("GET {goal} page {page}");
            tracing::debug!(%goal, page, "fetching datapoints");
            let req = self.with_token_query(self.http.get(&url)).query(&[
                ("sort", "desc".to_string()),
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ]);
            let resp = self.expect_success(self.send(req, &what)?, &what)?;
            let batch: Vec<ApiDatapoint> = resp
                .json()
                .map_err(|err| RemoteError::Permanent(format!("{what}: invalid json: {err}")))?;
            let len = batch.len();
            out.extend(batch);
            if len < PER_PAGE {
                break;
            }
        }
        tracing::debug!(%goal, count = out.len(), "fetched datapoints");
        Ok(out)
    }

    pub fn create_datapoint(
        &self,
        goal: &str,
        daystamp: &str,
        value: f64,
        comment: &str,
        requestid: &str,
    ) -> Result<Option<String>, RemoteError> {
        let what = format!("POST {goal} {daystamp}");
        let form = self.token_form(vec![
            ("value", value.to_string()),
            ("comment", comment.to_string()),
            ("daystamp", daystamp.to_string()),
            ("requestid", requestid.to_string()),
        ]);
        let resp = self.send(self.http.post(self.datapoints_url(goal)).form(&form), &what)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            if is_duplicate_request(status, &body) {
                tracing::info!(%goal, %daystamp, %requestid, "create already applied (duplicate requestid)");
                return Ok(None);
            }
            return Err(classify_status(status, &what, &body));
        }
        let created: ApiDatapoint = resp
            .json()
            .map_err(|err| RemoteError::Permanent(format!("{what}: invalid json: {err}")))?;
        Ok(created.id_string())
    }

    pub fn update_datapoint(
        &self,
        goal: &str,
        id: &str,
        daystamp: &str,
        value: f64,
        comment: &str,
    ) -> Result<(), RemoteError> {
        let what = format!("PUT {goal} {id}");
        let form = self.token_form(vec![
            ("value", value.to_string()),
            ("comment", comment.to_string()),
            ("daystamp", daystamp.to_string()),
        ]);
        let resp = self.send(self.http.put(self.datapoint_url(goal, id)).form(&form), &what)?;
        self.expect_success(resp, &what)?;
        Ok(())
    }

    pub fn delete_datapoint(&self, goal: &str, id: &str) -> Result<(), RemoteError> {
        let what = format!("DELETE {goal} {id}");
        let req = self.with_token_query(self.http.delete(self.datapoint_url(goal, id)));
        let resp = self.send(req, &what)?;
        self.expect_success(resp, &what)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beeminder::mock::{MockApi, TOKEN};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const FOCUSMATE_POINTS: &str = "/users/alice/goals/focusmate/datapoints.json";
    const TARGET_POINTS: &str = "/users/alice/goals/wakeandfocus/datapoints.json";

    fn page(prefix: &str, len: usize) -> Vec<Value> {
        (0..len)
            .map(|i| json!({"id": format!("{prefix}{i}"), "daystamp": "20240501", "value": 1}))
            .collect()
    }

    #[test]
    fn fetch_follows_pages_until_a_short_page() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("GET"))
                .and(path(FOCUSMATE_POINTS))
                .and(query_param("page", "1"))
                .and(query_param("per_page", "100"))
                .and(query_param("sort", "desc"))
                .and(query_param("auth_token", TOKEN))
                .respond_with(ResponseTemplate::new(200).set_body_json(page("a", PER_PAGE)))
                .expect(1),
        );
        api.mount(
            Mock::given(method("GET"))
                .and(path(FOCUSMATE_POINTS))
                .and(query_param("page", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(page("b", 2)))
                .expect(1),
        );

        let got = api.client().fetch_datapoints("focusmate").expect("fetch");
        assert_eq!(got.len(), PER_PAGE + 2);
        assert_eq!(got.last().and_then(ApiDatapoint::id_string).as_deref(), Some("b1"));
        assert_eq!(api.requests("GET").len(), 2);
    }

    #[test]
    fn create_sends_daystamp_and_requestid() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(TARGET_POINTS))
                .and(body_string_contains("auth_token=test-token"))
                .and(body_string_contains("daystamp=20240502"))
                .and(body_string_contains("requestid=wakeandfocus-20240502-sot-v1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new1"})))
                .expect(1),
        );

        let id = api
            .client()
            .create_datapoint("wakeandfocus", "20240502", 1.0, "52min", "wakeandfocus-20240502-sot-v1")
            .expect("create");
        assert_eq!(id.as_deref(), Some("new1"));
    }

    #[test]
    fn duplicate_requestid_counts_as_created() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(TARGET_POINTS))
                .respond_with(
                    ResponseTemplate::new(422)
                        .set_body_json(json!({"errors": "Duplicate request"})),
                )
                .expect(1),
        );

        let got = api
            .client()
            .create_datapoint("wakeandfocus", "20240502", 1.0, "c", "wakeandfocus-20240502-sot-v1");
        assert_eq!(got, Ok(None));
    }

    #[test]
    fn other_422_on_create_is_permanent() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(TARGET_POINTS))
                .respond_with(ResponseTemplate::new(422).set_body_string("value is not a number")),
        );

        let err = api
            .client()
            .create_datapoint("wakeandfocus", "20240502", 1.0, "c", "rid")
            .expect_err("rejected");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("value is not a number"));
    }

    #[test]
    fn rate_limits_and_server_errors_surface_as_transient() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("GET"))
                .and(path(FOCUSMATE_POINTS))
                .respond_with(ResponseTemplate::new(429)),
        );
        api.mount(
            Mock::given(method("DELETE"))
                .and(path("/users/alice/goals/wakeandfocus/datapoints/abc.json"))
                .and(query_param("auth_token", TOKEN))
                .respond_with(ResponseTemplate::new(503)),
        );

        let client = api.client();
        let fetch = client.fetch_datapoints("focusmate").expect_err("429");
        assert!(fetch.is_transient());
        let delete = client.delete_datapoint("wakeandfocus", "abc").expect_err("503");
        assert!(delete.is_transient());
    }

    #[test]
    fn unreachable_server_is_transient() {
        let client = BeeminderClient::new("http://127.0.0.1:9", "alice", None).expect("client");
        let err = client.fetch_datapoints("focusmate").expect_err("refused");
        assert!(err.is_transient());
    }

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(classify_status(StatusCode::BAD_GATEWAY, "GET x", "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "GET x", "").is_transient());
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, "POST x", "bad").is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, "DELETE x", "").is_transient());
    }

    #[test]
    fn status_message_carries_truncated_body() {
        let body = "e".repeat(1_000);
        let err = classify_status(StatusCode::BAD_REQUEST, "PUT g 1", &body);
        let RemoteError::Permanent(msg) = err else {
            panic!("expected permanent error");
        };
        assert!(msg.starts_with("PUT g 1 -> 400 Bad Request: "));
        assert!(msg.ends_with('…'));
    }

    #[test]
    fn duplicate_request_is_detected_on_422_only() {
        let body = r#"{"errors":"Duplicate request"}"#;
        assert!(is_duplicate_request(StatusCode::UNPROCESSABLE_ENTITY, body));
        assert!(!is_duplicate_request(StatusCode::BAD_REQUEST, body));
        assert!(!is_duplicate_request(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"errors":"value missing"}"#
        ));
    }

    #[test]
    fn datapoint_ids_accept_strings_and_numbers() {
        let raw = r#"[
            {"id":"5f1e","timestamp":1714608000,"daystamp":"20240502","value":1,"comment":"ok"},
            {"id":7,"value":0},
            {"id":"  ","value":0}
        ]"#;
        let parsed: Vec<ApiDatapoint> = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed[0].id_string().as_deref(), Some("5f1e"));
        assert_eq!(parsed[0].daystamp.as_deref(), Some("20240502"));
        assert_eq!(parsed[1].id_string().as_deref(), Some("7"));
        assert_eq!(parsed[2].id_string(), None);
    }

    #[test]
    fn urls_strip_trailing_slash_from_base() {
        let client = BeeminderClient::new("http://localhost:1/api/v1/", "alice", None)
            .expect("client");
        assert_eq!(
            client.datapoint_url("wakeandfocus", "abc"),
            "http://localhost:1/api/v1/users/alice/goals/wakeandfocus/datapoints/abc.json"
        );
    }
}
