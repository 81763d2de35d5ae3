//! Route provider (§4.E): produces `{tasks, metadata}` either from a cached
//! JSON document or from a live directions + reverse-geocode round trip.

mod html;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use routecast_checkpoint::CheckpointStore;
use routecast_types::{Coordinates, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use html::strip_html;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteBundle {
    pub tasks: Vec<Task>,
    pub metadata: Value,
}

#[derive(Debug)]
pub enum RouteError {
    RouteTooLarge {
        step_count: usize,
        max_steps: usize,
        remedy: String,
    },
    RouteFetchFailed(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::RouteTooLarge {
                step_count,
                max_steps,
                remedy,
            } => write!(
                f,
                "route too large: {step_count} steps exceeds max_steps={max_steps}; {remedy}"
            ),
            RouteError::RouteFetchFailed(detail) => write!(f, "route fetch failed: {detail}"),
        }
    }
}

impl std::error::Error for RouteError {}

/// One directions-API leg: the only fields the core needs are the turn
/// instructions (HTML, stripped to text before becoming `Task::instructions`)
/// and the leg's end coordinate, which is reverse-geocoded.
#[derive(Debug, Clone)]
pub struct DirectionsStep {
    pub instructions_html: String,
    pub end_location: Coordinates,
}

#[derive(Debug, Clone)]
pub struct DirectionsResponse {
    pub steps: Vec<DirectionsStep>,
}

#[async_trait]
pub trait DirectionsClient: Send + Sync {
    async fn directions(&self, origin: &str, destination: &str) -> anyhow::Result<DirectionsResponse>;
}

#[derive(Debug, Clone)]
pub struct ReverseGeocodeResult {
    pub location_name: String,
    pub formatted_address: String,
}

#[async_trait]
pub trait GeocodeClient: Send + Sync {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> anyhow::Result<ReverseGeocodeResult>;
}

/// Reads a pre-shaped route document and passes the step list through with
/// minimal shaping: filling `search_hint`/`route_context` when a step left
/// them blank.
pub struct CachedRouteProvider {
    checkpoint: CheckpointStore,
}

impl CachedRouteProvider {
    pub fn new(checkpoint: CheckpointStore) -> Self {
        Self { checkpoint }
    }

    pub async fn load(
        &self,
        path: &Path,
        transaction_id: &str,
        route_context: &str,
    ) -> anyhow::Result<RouteBundle> {
        let raw = tokio::fs::read(path).await?;
        let mut tasks: Vec<Task> = serde_json::from_slice(&raw)?;
        for task in &mut tasks {
            if task.transaction_id.is_empty() {
                task.transaction_id = transaction_id.to_string();
            }
        }
        let tasks = tasks
            .into_iter()
            .map(|t| t.with_defaults_filled(route_context))
            .collect();
        let bundle = RouteBundle {
            tasks,
            metadata: serde_json::json!({"source": "cached", "path": path.display().to_string()}),
        };
        self.checkpoint.write_route(transaction_id, &bundle).await;
        Ok(bundle)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LiveRouteConfig {
    pub max_steps: usize,
    pub retry_attempts: u32,
    pub timeout: Duration,
}

impl Default for LiveRouteConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            retry_attempts: 3,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Calls an external directions service, reverse-geocodes every leg's end
/// coordinate (memoized by coordinates rounded to 6 decimal places), and
/// strips each step's HTML instructions down to plain text.
pub struct LiveRouteProvider<D, G> {
    directions: D,
    geocode: G,
    config: LiveRouteConfig,
    checkpoint: CheckpointStore,
    geocode_cache: Mutex<HashMap<(i64, i64), ReverseGeocodeResult>>,
}

impl<D, G> LiveRouteProvider<D, G>
where
    D: DirectionsClient,
    G: GeocodeClient,
{
    pub fn new(directions: D, geocode: G, config: LiveRouteConfig, checkpoint: CheckpointStore) -> Self {
        Self {
            directions,
            geocode,
            config,
            checkpoint,
            geocode_cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn plan(
        &self,
        origin: &str,
        destination: &str,
        transaction_id: &str,
    ) -> Result<RouteBundle, RouteError> {
        let response = self.fetch_directions_with_retry(origin, destination).await?;

        if response.steps.len() > self.config.max_steps {
            return Err(RouteError::RouteTooLarge {
                step_count: response.steps.len(),
                max_steps: self.config.max_steps,
                remedy: format!(
                    "split the route into segments of at most {} steps",
                    self.config.max_steps
                ),
            });
        }

        let mut tasks = Vec::with_capacity(response.steps.len());
        for (index, step) in response.steps.iter().enumerate() {
            let geocoded = self
                .reverse_geocode_memoized(step.end_location)
                .await
                .map_err(|e| RouteError::RouteFetchFailed(e.to_string()))?;
            let task = Task {
                transaction_id: transaction_id.to_string(),
                step_number: index as u32 + 1,
                location_name: geocoded.location_name,
                address: Some(geocoded.formatted_address),
                coordinates: Some(step.end_location),
                instructions: strip_html(&step.instructions_html),
                search_hint: String::new(),
                route_context: String::new(),
                timestamp: Utc::now(),
                emit_timestamp: None,
            }
            .with_defaults_filled(destination);
            tasks.push(task);
        }

        let bundle = RouteBundle {
            tasks,
            metadata: serde_json::json!({"source": "live", "origin": origin, "destination": destination}),
        };
        self.checkpoint.write_route(transaction_id, &bundle).await;
        Ok(bundle)
    }

    async fn fetch_directions_with_retry(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<DirectionsResponse, RouteError> {
        let mut attempt = 0u32;
        loop {
            let call = self.directions.directions(origin, destination);
            match tokio::time::timeout(self.config.timeout, call).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => {
                    if attempt + 1 >= self.config.retry_attempts {
                        return Err(RouteError::RouteFetchFailed(err.to_string()));
                    }
                }
                Err(_elapsed) => {
                    if attempt + 1 >= self.config.retry_attempts {
                        return Err(RouteError::RouteFetchFailed(format!(
                            "directions call timed out after {:?}",
                            self.config.timeout
                        )));
                    }
                }
            }
            let delay = Duration::from_secs_f64(0.5 * 2f64.powi(attempt as i32)).min(self.config.timeout);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn reverse_geocode_memoized(&self, coords: Coordinates) -> anyhow::Result<ReverseGeocodeResult> {
        let key = round_key(coords);
        if let Some(cached) = self.geocode_cache.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }
        let result = self.geocode.reverse_geocode(coords).await?;
        self.geocode_cache.lock().unwrap().insert(key, result.clone());
        Ok(result)
    }
}

/// Default directions/geocode client pair hitting a Google-Maps-shaped
/// HTTP API. The response bodies themselves are an external collaborator's
/// concern (§1): this struct only owns the transport and the narrow slice
/// of shape the core cares about (end coordinate, HTML instructions, a
/// human-readable name and address).
#[derive(Clone)]
pub struct HttpMapsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpMapsClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DirectionsClient for HttpMapsClient {
    async fn directions(&self, origin: &str, destination: &str) -> anyhow::Result<DirectionsResponse> {
        let url = format!("{}/directions", self.base_url.trim_end_matches('/'));
        let value: Value = self
            .client
            .get(url)
            .query(&[("origin", origin), ("destination", destination), ("key", &self.api_key)])
            .send()
            .await?
            .json()
            .await?;

        let steps = value["routes"][0]["legs"][0]["steps"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|step| {
                let html = step["html_instructions"].as_str()?.to_string();
                let lat = step["end_location"]["lat"].as_f64()?;
                let lng = step["end_location"]["lng"].as_f64()?;
                Some(DirectionsStep {
                    instructions_html: html,
                    end_location: Coordinates { lat, lng },
                })
            })
            .collect();

        Ok(DirectionsResponse { steps })
    }
}

#[async_trait]
impl GeocodeClient for HttpMapsClient {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> anyhow::Result<ReverseGeocodeResult> {
        let url = format!("{}/geocode", self.base_url.trim_end_matches('/'));
        let latlng = format!("{},{}", coordinates.lat, coordinates.lng);
        let value: Value = self
            .client
            .get(url)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?
            .json()
            .await?;

        let formatted_address = value["results"][0]["formatted_address"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let location_name = value["results"][0]["address_components"][0]["long_name"]
            .as_str()
            .unwrap_or(&formatted_address)
            .to_string();

        Ok(ReverseGeocodeResult {
            location_name,
            formatted_address,
        })
    }
}

fn round_key(coords: Coordinates) -> (i64, i64) {
    let scale = 1_000_000.0;
    (
        (coords.lat * scale).round() as i64,
        (coords.lng * scale).round() as i64,
    )
}
