//! Local HTTP stand-in for vendor APIs, bound to an ephemeral port.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use url::Url;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Default)]
struct Stub {
    replies: Mutex<VecDeque<(StatusCode, String)>>,
    seen: Mutex<Vec<Recorded>>,
}

pub struct Upstream {
    pub base: Url,
    stub: Arc<Stub>,
}

impl Upstream {
    /// Serve the given replies in order, one per request.
    pub async fn start(replies: Vec<(u16, serde_json::Value)>) -> Self {
        let stub = Arc::new(Stub {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|(status, body)| (StatusCode::from_u16(status).unwrap(), body.to_string()))
                    .collect(),
            ),
            seen: Mutex::default(),
        });
        let app = Router::new().fallback(respond).with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: Url::parse(&format!("http://{addr}/")).unwrap(),
            stub,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.stub.seen.lock().unwrap().clone()
    }
}

async fn respond(
    State(stub): State<Arc<Stub>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.seen.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    let (status, body) = stub
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "{}".into()));
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Chat-completions body whose first choice says `content`.
pub fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}
