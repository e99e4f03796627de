use std::future::Future;
use std::time::Duration;

use flume::Sender;
use reqwest::Client;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::asserter::Asserter;
use crate::asserter::Comparison;
use crate::path::build_query;
use crate::path::fill_path;
use crate::report::Bodies;
use crate::report::CaseOutcome;
use crate::report::CaseReport;
use crate::report::SuiteReport;
use crate::report::TestReport;
use crate::validator::ApiPlan;
use crate::validator::CaseParams;
use crate::validator::SuitePlan;
use crate::validator::TestPlan;
use crate::validator::overlay;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Http { url: Url, source: reqwest::Error },

    #[error("{url} responded with {status}: {body}")]
    Status {
        url: Url,
        status: StatusCode,
        body: String,
    },

    #[error("{url} did not return JSON: {source}")]
    InvalidJson {
        url: Url,
        source: serde_json::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

/// Messages sent to the outputter while the run makes progress.
#[derive(Debug, Clone)]
pub enum RunEvent {
    TestStarted { name: String, n_cases: usize },
    CaseFinished { test: String, report: CaseReport },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub print_responses: bool,
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            print_responses: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A fully resolved request to one backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

/// Performs a request and hands back the decoded JSON body.
pub trait Fetch {
    fn fetch(
        &self,
        request: &BackendRequest,
    ) -> impl Future<Output = Result<Value, RequestError>> + Send;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &BackendRequest) -> Result<Value, RequestError> {
        let http_error = |source| RequestError::Http {
            url: request.url.clone(),
            source,
        };

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        // Consume the body exactly once
        let body = response.text().await.map_err(http_error)?;

        if !status.is_success() {
            return Err(RequestError::Status {
                url: request.url.clone(),
                status,
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|source| RequestError::InvalidJson {
            url: request.url.clone(),
            source,
        })
    }
}

/// Runs every case of every test, one case at a time.
///
/// A failing case is recorded and the run moves on; only cancellation stops
/// it early. Every finished case is also sent to `tx` as soon as it is known.
pub async fn run_tests<F: Fetch>(
    plan: &SuitePlan,
    fetcher: &F,
    options: &RunOptions,
    mut cancel: watch::Receiver<bool>,
    tx: Sender<RunEvent>,
) -> SuiteReport {
    let mut report = SuiteReport::default();

    'tests: for test in &plan.tests {
        send(
            &tx,
            RunEvent::TestStarted {
                name: test.name.clone(),
                n_cases: test.cases.len(),
            },
        )
        .await;

        let mut test_report = TestReport {
            name: test.name.clone(),
            cases: Vec::with_capacity(test.cases.len()),
        };

        for (index, case) in test.cases.iter().enumerate() {
            let result = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => Err(RequestError::Cancelled),
                result = run_case(plan, test, &case.api_a, &case.api_b, fetcher) => result,
            };

            let interrupted = matches!(result, Err(RequestError::Cancelled));

            let case_report = match result {
                Ok(comparison) => CaseReport {
                    name: case.name.clone(),
                    bodies: options.print_responses.then(|| Bodies {
                        a: comparison.a.clone(),
                        b: comparison.b.clone(),
                    }),
                    outcome: if comparison.passed() {
                        CaseOutcome::Pass
                    } else {
                        CaseOutcome::Fail {
                            diffs: comparison.diffs,
                        }
                    },
                },
                Err(error) => {
                    warn!(test = %test.name, case = %case.name, %error, "case failed to run");
                    CaseReport {
                        name: case.name.clone(),
                        outcome: CaseOutcome::Error {
                            message: error.to_string(),
                        },
                        bodies: None,
                    }
                }
            };

            send(
                &tx,
                RunEvent::CaseFinished {
                    test: test.name.clone(),
                    report: case_report.clone(),
                },
            )
            .await;
            test_report.cases.push(case_report);

            if interrupted {
                warn!(
                    skipped = test.cases.len() - index - 1,
                    "run cancelled, remaining cases are skipped"
                );
                report.interrupted = true;
                report.tests.push(test_report);
                break 'tests;
            }
        }

        report.tests.push(test_report);
    }

    report
}

async fn run_case<F: Fetch>(
    plan: &SuitePlan,
    test: &TestPlan,
    params_a: &CaseParams,
    params_b: &CaseParams,
    fetcher: &F,
) -> Result<Comparison, RequestError> {
    let request_a = build_request(&test.method, &test.api_a, params_a)?;
    let request_b = build_request(&test.method, &test.api_b, params_b)?;

    debug!(test = %test.name, url = %request_a.url, headers = ?request_a.headers, "request A");
    debug!(test = %test.name, url = %request_b.url, headers = ?request_b.headers, "request B");

    let (body_a, body_b) = tokio::try_join!(fetcher.fetch(&request_a), fetcher.fetch(&request_b))?;

    Ok(Asserter::compare(plan, test, body_a, body_b))
}

/// Resolves the url and merges headers: base, then api, then case.
pub fn build_request(
    method: &Method,
    api: &ApiPlan,
    params: &CaseParams,
) -> Result<BackendRequest, RequestError> {
    let url = format!(
        "{}{}{}",
        api.base_url,
        fill_path(&api.path, params.path_params.as_ref()),
        build_query(params.query_params.as_ref())
    );
    let url = Url::parse(&url).map_err(|source| RequestError::InvalidUrl { url, source })?;

    let mut headers = api.headers.clone();
    overlay(&mut headers, params.headers.clone());

    Ok(BackendRequest {
        method: method.clone(),
        url,
        headers,
    })
}

/// Resolves once the run is cancelled. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn send(tx: &Sender<RunEvent>, event: RunEvent) {
    if let Err(error) = tx.send_async(event).await {
        warn!(%error, "outputter is gone, continuing without live output");
    }
}
