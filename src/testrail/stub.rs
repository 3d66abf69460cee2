//! Loopback HTTP stub used by the client and publisher tests.
//!
//! Serves one canned response per request, in order, and records each
//! request it sees.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Response, Server};

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    /// Start serving `responses` as `(status, body)` pairs.
    pub fn start(responses: Vec<(u16, &str)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("start stub server");
        let addr = server.server_addr().to_ip().expect("stub address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else {
                    return;
                };

                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                let mut request_body = String::new();
                let _ = request.as_reader().read_to_string(&mut request_body);

                recorded.lock().expect("stub lock").push(RecordedRequest {
                    method: request.method().to_string(),
                    target: request.url().to_string(),
                    authorization,
                    body: request_body,
                });

                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("static header");
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    /// Requests served so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("stub lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_responses_in_order_and_records_requests() {
        let server = StubServer::start(vec![(200, r#"{"n": 1}"#), (404, r#"{"error": "gone"}"#)]);
        let http = reqwest::Client::builder().no_proxy().build().unwrap();

        let first = http
            .post(format!("{}/index.php?/api/v2/add_run/1", server.base_url))
            .basic_auth("u", Some("k"))
            .body(r#"{"name": "x"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(first.status().as_u16(), 200);
        assert_eq!(
            first
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert_eq!(first.text().await.unwrap(), r#"{"n": 1}"#);

        let second = http
            .get(format!("{}/index.php?/api/v2/get_run/2", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(second.status().as_u16(), 404);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/index.php?/api/v2/add_run/1");
        // base64("u:k")
        assert_eq!(requests[0].authorization.as_deref(), Some("Basic dTpr"));
        assert_eq!(requests[0].body, r#"{"name": "x"}"#);
        assert_eq!(requests[1].method, "GET");
        assert!(requests[1].authorization.is_none());
        assert!(requests[1].body.is_empty());
    }
}
