//! Occupancy client for the CI control-plane API.
//!
//! Demand is the number of queued and running jobs for one agent type.
//! The jobs endpoint is paginated; every page is fetched and merged before
//! counting.

use std::collections::VecDeque;

use async_trait::async_trait;
use fleet_cloud::ClientTimeouts;
use fleet_reconcile::{OccupancyReport, STATE_QUEUED, STATE_RUNNING};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::ScalerError;

/// Path of the jobs listing endpoint.
pub const JOBS_PATH: &str = "/api/v1alpha/jobs";

const USER_AGENT: &str = "aws-dynamic-scaler";

/// Source of demand metrics.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    /// Fetch the current job counts by state.
    async fn fetch_occupancy(&self, token: &str) -> Result<OccupancyReport, ScalerError>;
}

/// HTTP occupancy client.
pub struct OccupancyClient {
    client: reqwest::Client,
    base_url: String,
    agent_type: String,
}

impl OccupancyClient {
    /// Create a new occupancy client.
    pub fn new(
        base_url: &str,
        agent_type: &str,
        timeouts: ClientTimeouts,
    ) -> Result<Self, ScalerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.per_call())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_type: agent_type.to_string(),
        })
    }

    /// Fetch a single page of jobs.
    async fn fetch_page(
        &self,
        token: &str,
        page_token: Option<&str>,
    ) -> Result<JobPage, ScalerError> {
        let url = format!("{}{}", self.base_url, JOBS_PATH);

        let mut query = vec![("states", STATE_QUEUED), ("states", STATE_RUNNING)];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Token {}", token))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to fetch jobs");
            return Err(ScalerError::OccupancyStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ScalerError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl OccupancySource for OccupancyClient {
    async fn fetch_occupancy(&self, token: &str) -> Result<OccupancyReport, ScalerError> {
        debug!(agent_type = %self.agent_type, "Fetching jobs");

        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_page(token, page_token.as_deref()).await?;
            pages += 1;
            jobs.extend(page.jobs);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        let report = count_by_state(&jobs, &self.agent_type);
        debug!(
            pages,
            jobs = jobs.len(),
            demand = report.total(),
            "Fetched jobs"
        );
        Ok(report)
    }
}

/// Count jobs of `agent_type` by state.
pub fn count_by_state(jobs: &[Job], agent_type: &str) -> OccupancyReport {
    jobs.iter()
        .filter(|job| job.machine_type() == Some(agent_type))
        .filter_map(|job| job.state())
        .collect()
}

/// One page of the jobs listing.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPage {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// The subset of a job the controller looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub spec: JobSpec,
    #[serde(default)]
    pub status: JobStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub agent: Option<JobAgent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobAgent {
    #[serde(default)]
    pub machine: Option<JobMachine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobMachine {
    #[serde(rename = "type", default)]
    pub machine_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub state: Option<String>,
}

impl Job {
    pub fn machine_type(&self) -> Option<&str> {
        self.spec
            .agent
            .as_ref()?
            .machine
            .as_ref()?
            .machine_type
            .as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.status.state.as_deref()
    }
}

/// Scripted occupancy source for tests and local runs.
///
/// Returns queued results in order and repeats the last one once the queue
/// runs dry.
pub struct MockOccupancy {
    responses: Mutex<VecDeque<Result<OccupancyReport, String>>>,
    last: Mutex<Option<Result<OccupancyReport, String>>>,
    tokens: Mutex<Vec<String>>,
}

impl MockOccupancy {
    pub fn new(report: OccupancyReport) -> Self {
        Self::scripted(vec![Ok(report)])
    }

    /// Results to hand out, one per call. `Err` strings become
    /// `MalformedResponse` errors.
    pub fn scripted(responses: Vec<Result<OccupancyReport, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Tokens passed to each call.
    pub async fn tokens(&self) -> Vec<String> {
        self.tokens.lock().await.clone()
    }
}

#[async_trait]
impl OccupancySource for MockOccupancy {
    async fn fetch_occupancy(&self, token: &str) -> Result<OccupancyReport, ScalerError> {
        self.tokens.lock().await.push(token.to_string());

        let mut last = self.last.lock().await;
        if let Some(next) = self.responses.lock().await.pop_front() {
            *last = Some(next);
        }

        match last.clone() {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(ScalerError::MalformedResponse(message)),
            None => Ok(OccupancyReport::new()),
        }
    }
}
