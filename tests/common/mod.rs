//! Shared fixtures for the rewriter integration tests

use futures::FutureExt;
use futures::future::BoxFuture;
use kodegen_tools_rewriter::{FetchError, HttpRequest, HttpResponse, ResourceFetcher, Uri};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Route {
    Respond {
        status: StatusCode,
        content_type: String,
        body: String,
        delay: Option<Duration>,
    },
    Fail,
}

/// In-memory fetcher keyed by canonical URL. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.route(url, status, content_type, body, None)
    }

    pub fn with_delay(self, url: &str, delay: Duration, content_type: &str, body: &str) -> Self {
        self.route(url, 200, content_type, body, Some(delay))
    }

    /// Every fetch of `url` fails without a response.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.routes.insert(canonical(url), Route::Fail);
        self
    }

    fn route(
        mut self,
        url: &str,
        status: u16,
        content_type: &str,
        body: &str,
        delay: Option<Duration>,
    ) -> Self {
        let status = StatusCode::from_u16(status).expect("valid status code");
        self.routes.insert(
            canonical(url),
            Route::Respond {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
                delay,
            },
        );
        self
    }

    /// URLs fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.uri.to_string())
            .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

impl ResourceFetcher for MockFetcher {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        async move {
            let url = request.uri.to_string();
            self.requests.lock().push(request);
            match self.routes.get(&url).cloned() {
                None => Ok(HttpResponse::new(StatusCode::NOT_FOUND)),
                Some(Route::Fail) => Err(FetchError::Transport {
                    url,
                    message: "connection refused".to_string(),
                }),
                Some(Route::Respond {
                    status,
                    content_type,
                    body,
                    delay,
                }) => {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(HttpResponse::new(status)
                        .with_header(CONTENT_TYPE, &content_type)
                        .with_body(body.into_bytes()))
                }
            }
        }
        .boxed()
    }
}

fn canonical(url: &str) -> String {
    uri(url).to_string()
}

#[allow(dead_code)]
pub fn uri(s: &str) -> Uri {
    Uri::parse(s).expect("valid test uri")
}

/// Absolute targets named by a batch URL, in parameter order.
#[allow(dead_code)]
pub fn batch_targets(batch: &str) -> Vec<String> {
    let batch = uri(batch);
    (1..)
        .map_while(|i| batch.query_parameter(&i.to_string()).map(str::to_string))
        .collect()
}
