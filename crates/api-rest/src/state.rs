//! Shared state handed to every request handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use readmit_core::{
    builtin_samples, Cohort, CohortConfig, ExplanationResult, Explainer, NormalizedPatientInput,
};
use tokio::sync::RwLock;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe view of an [`Explainer`], so the router does not carry its type.
trait ErasedExplainer: Send + Sync {
    fn explain_boxed<'a>(
        &'a self,
        input: &'a NormalizedPatientInput,
    ) -> BoxFuture<'a, Result<ExplanationResult, String>>;
}

impl<E> ErasedExplainer for E
where
    E: Explainer + Send + Sync,
{
    fn explain_boxed<'a>(
        &'a self,
        input: &'a NormalizedPatientInput,
    ) -> BoxFuture<'a, Result<ExplanationResult, String>> {
        Box::pin(async move { self.explain(input).await.map_err(|e| e.to_string()) })
    }
}

/// Cloneable handle to whichever explainer the server was started with.
#[derive(Clone)]
pub struct ExplainHandle(Arc<dyn ErasedExplainer>);

impl ExplainHandle {
    pub fn new<E>(explainer: E) -> Self
    where
        E: Explainer + Send + Sync + 'static,
    {
        Self(Arc::new(explainer))
    }
}

impl Explainer for ExplainHandle {
    type Error = String;

    async fn explain(&self, input: &NormalizedPatientInput) -> Result<ExplanationResult, String> {
        self.0.explain_boxed(input).await
    }
}

/// Application state for the REST API server
///
/// The cohort is the single in-memory table for this process; uploads and manual submissions
/// append to it, listing and export read from it.
#[derive(Clone)]
pub struct AppState {
    pub(crate) cohort: Arc<RwLock<Cohort>>,
    pub(crate) explainer: ExplainHandle,
    pub(crate) api_key: Option<Arc<str>>,
    pub(crate) default_page_size: usize,
    pub(crate) samples: Arc<[NormalizedPatientInput]>,
}

impl AppState {
    pub fn new(cohort: Cohort, explainer: ExplainHandle, cfg: &CohortConfig) -> Self {
        Self {
            cohort: Arc::new(RwLock::new(cohort)),
            explainer,
            api_key: None,
            default_page_size: cfg.default_page_size.max(1),
            samples: builtin_samples().into(),
        }
    }

    /// Patients `POST /explain/sample` picks from. An empty list keeps the built-in sample.
    pub fn with_samples(mut self, samples: Vec<NormalizedPatientInput>) -> Self {
        if !samples.is_empty() {
            self.samples = samples.into();
        }
        self
    }

    /// Requires the `x-api-key` header on uploads. `None` or blank leaves uploads open.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Arc::from);
        self
    }

    pub fn cohort(&self) -> &Arc<RwLock<Cohort>> {
        &self.cohort
    }
}
