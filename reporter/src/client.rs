use crate::artifact::{ArtifactResolver, NoArtifacts, PendingArtifacts};
use crate::config::ReporterConfig;
use crate::format::ErrorFormatter;
use crate::http::HttpTransport;
use crate::payload::{RunBody, StatusUpdateBody, TestRunPayload};
use crate::queue::RequestQueue;
use crate::store::RunStore;
use crate::transport::{ReporterError, ReporterResult, Transport};
use crate::types::{RunStatus, TestRun, TestStatus};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use reqwest::Method;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info};

/// Reports one run to Testomat.io.
///
/// Every operation goes through one [`RequestQueue`], so requests reach the
/// API in the order the methods were called, one at a time. The returned
/// futures never fail: reporting problems are logged and swallowed so they
/// cannot break the test run being reported.
///
/// The run id lives in a [`RunStore`]. A client whose store (or config)
/// already holds an id resumes that run instead of creating one, and a
/// client that creates a run writes the new id into its store.
pub struct TestomatClient {
    config: Arc<ReporterConfig>,
    transport: Arc<dyn Transport>,
    artifacts: Arc<dyn ArtifactResolver>,
    store: RunStore,
    resumed_run: Option<String>,
    run_url: Arc<RwLock<Option<String>>>,
    formatter: ErrorFormatter,
    queue: RequestQueue,
}

impl TestomatClient {
    /// HTTP client with artifact uploads disabled. Must be called within a
    /// Tokio runtime.
    pub fn new(config: ReporterConfig) -> ReporterResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(NoArtifacts),
            RunStore::new(),
        ))
    }

    pub fn with_parts(
        config: ReporterConfig,
        transport: Arc<dyn Transport>,
        artifacts: Arc<dyn ArtifactResolver>,
        store: RunStore,
    ) -> Self {
        let resumed_run = config.run_id.clone().or_else(|| store.get());
        if let Some(run_id) = &resumed_run {
            store.set(run_id.clone());
        }

        Self {
            formatter: ErrorFormatter::new(config.colored_output),
            config: Arc::new(config),
            transport,
            artifacts,
            store,
            resumed_run,
            run_url: Arc::new(RwLock::new(None)),
            queue: RequestQueue::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactResolver>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn run_id(&self) -> Option<String> {
        self.store.get()
    }

    pub fn run_url(&self) -> Option<String> {
        self.run_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Creates the run, or resumes the one this client was built with.
    ///
    /// Resolves with the run id, or `None` when the URL is invalid or the API
    /// refused to create a run. A resumed run resolves right away; its update
    /// request still goes through the queue.
    pub fn create_run(&self) -> BoxFuture<'static, Option<String>> {
        if let Err(message) = self.config.validate_url() {
            error!("Cannot report to Testomat.io: {}", message);
            return future::ready(None).boxed();
        }

        let body = RunBody {
            api_key: self.config.api_key.clone(),
            title: self.config.title.clone(),
            parallel: self.config.parallel,
            group_title: self.config.group_title.clone(),
            env: self.config.env.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let api_root = self.config.api_root().to_string();

        if let Some(run_id) = self.resumed_run.clone() {
            let endpoint = format!("{}/api/reporter/{}", api_root, run_id);
            let resumed = run_id.clone();
            drop(self.queue.enqueue("run update", move || async move {
                let body = serde_json::to_value(&body)?;
                transport
                    .send(Method::PUT, &endpoint, Some(body))
                    .await?
                    .into_result()?;
                info!("Reporting into existing run {}", resumed);
                Ok(())
            }));
            return future::ready(Some(run_id)).boxed();
        }

        let store = self.store.clone();
        let run_url = Arc::clone(&self.run_url);
        let endpoint = format!("{}/api/reporter", api_root);

        self.queue
            .enqueue("run creation", move || async move {
                let body = serde_json::to_value(&body)?;
                let response = transport
                    .send(Method::POST, &endpoint, Some(body))
                    .await?
                    .into_result()?;

                let run_id = response
                    .body
                    .get("uid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| ReporterError::Rejected {
                        status: response.status,
                        message: "response did not contain a run uid".to_string(),
                    })?;
                let public_url = response
                    .body
                    .get("url")
                    .and_then(Value::as_str)
                    .and_then(|url| public_run_url(&api_root, url));

                store.set(run_id.clone());
                *run_url.write().unwrap_or_else(PoisonError::into_inner) = public_url.clone();

                match public_url {
                    Some(url) => info!("Created run {}: {}", run_id, url),
                    None => info!("Created run {}", run_id),
                }
                Ok(run_id)
            })
            .boxed()
    }

    /// Submits one test result. Does nothing when no run exists by the time
    /// the request is dequeued.
    pub fn add_test_run(
        &self,
        test_id: Option<String>,
        status: TestStatus,
        run: TestRun,
    ) -> BoxFuture<'static, ()> {
        let artifacts = Arc::clone(&self.artifacts);
        let early_uploads = match self.store.get() {
            Some(run_id) if !run.files.is_empty() => Some(PendingArtifacts::start(
                Arc::clone(&artifacts),
                &run.files,
                &run_id,
            )),
            _ => None,
        };

        let config = Arc::clone(&self.config);
        let transport = Arc::clone(&self.transport);
        let store = self.store.clone();
        let formatter = self.formatter.clone();

        self.queue
            .enqueue("test result", move || async move {
                let Some(run_id) = store.get() else {
                    debug!("No run available, result for {:?} not reported", run.title);
                    return Ok(());
                };

                let pending = early_uploads
                    .unwrap_or_else(|| PendingArtifacts::start(artifacts, &run.files, &run_id));
                let uploaded = if pending.is_empty() {
                    Vec::new()
                } else {
                    debug!("Waiting for artifacts of {:?}", run.title);
                    pending.collect().await
                };

                let payload = TestRunPayload::build(
                    &config.api_key,
                    test_id,
                    status,
                    &run,
                    &formatter,
                    uploaded,
                );
                let body = serde_json::to_value(&payload)?;
                let endpoint = format!("{}/api/reporter/{}/testrun", config.api_root(), run_id);

                transport
                    .send(Method::POST, &endpoint, Some(body))
                    .await?
                    .into_result()?;
                debug!("Reported {:?} as {}", payload.title, status);
                Ok(())
            })
            .map(|_| ())
            .boxed()
    }

    /// Finishes the run with an aggregate status.
    pub fn update_run_status(&self, status: RunStatus, parallel: bool) -> BoxFuture<'static, ()> {
        let config = Arc::clone(&self.config);
        let transport = Arc::clone(&self.transport);
        let store = self.store.clone();
        let run_url = Arc::clone(&self.run_url);

        self.queue
            .enqueue("run status update", move || async move {
                let Some(run_id) = store.get() else {
                    debug!("No run available, status {} not reported", status);
                    return Ok(());
                };
                let public_url = run_url
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();

                if config.proceed {
                    info!("Run {} is kept in progress", run_id);
                    if let Some(url) = public_url {
                        info!("Report: {}", url);
                    }
                    return Ok(());
                }

                let body = serde_json::to_value(StatusUpdateBody::new(
                    config.api_key.clone(),
                    status,
                    parallel,
                ))?;
                let endpoint = format!("{}/api/reporter/{}", config.api_root(), run_id);

                transport
                    .send(Method::PUT, &endpoint, Some(body))
                    .await?
                    .into_result()?;

                match public_url {
                    Some(url) => info!("Report saved: {}", url),
                    None => info!("Run {} finished as {}", run_id, status),
                }
                Ok(())
            })
            .map(|_| ())
            .boxed()
    }

    /// Waits until everything enqueued so far has been sent or dropped.
    pub fn flush(&self) -> BoxFuture<'static, ()> {
        self.queue.flush().boxed()
    }
}

/// Joins the path of the server-returned run URL onto the configured base.
fn public_run_url(api_root: &str, server_url: &str) -> Option<String> {
    let path = match url::Url::parse(server_url) {
        Ok(parsed) => {
            let mut path = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        }
        Err(_) if server_url.starts_with('/') => server_url.to_string(),
        Err(_) => return None,
    };
    Some(format!("{}{}", api_root, path))
}
