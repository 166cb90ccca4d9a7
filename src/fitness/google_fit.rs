use crate::config::Config;
use crate::fitness::{FitnessProvider, FitnessSample};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const STEPS: &str = "com.google.step_count.delta";
const CALORIES: &str = "com.google.calories.expended";
const ACTIVE_MINUTES: &str = "com.google.active_minutes";
const DISTANCE: &str = "com.google.distance.delta";
const DAY_MILLIS: i64 = 86_400_000;

#[derive(Debug, Default, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    bucket: Vec<Bucket>,
}

#[derive(Debug, Default, Deserialize)]
struct Bucket {
    #[serde(default)]
    dataset: Vec<Dataset>,
}

#[derive(Debug, Default, Deserialize)]
struct Dataset {
    #[serde(default)]
    point: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
struct Point {
    #[serde(default)]
    value: Vec<PointValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointValue {
    int_val: Option<i64>,
    fp_val: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct GoogleFitClient {
    base_url: String,
    access_token: Option<String>,
    timeout_seconds: u64,
}

impl GoogleFitClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.fitness_api_base_url.clone(),
            access_token: config.resolve_fitness_token(),
            timeout_seconds: config.fitness_timeout_seconds.max(3),
        }
    }
}

impl FitnessProvider for GoogleFitClient {
    fn fetch_today_sample(&self, date: NaiveDate) -> Result<FitnessSample> {
        let token = self.access_token.clone().context(
            "Fitness access token is missing. Set `shineup config set fitness.access_token <TOKEN>` or `SHINEUP_FITNESS_TOKEN`.",
        )?;
        let (start_millis, end_millis) = local_day_bounds(date)?;
        let base_url = self.base_url.clone();
        let timeout_seconds = self.timeout_seconds;

        // The blocking client must not run on an async worker thread.
        std::thread::spawn(move || {
            fetch_sample_blocking(&base_url, &token, timeout_seconds, start_millis, end_millis)
        })
        .join()
        .map_err(|_| anyhow!("fitness worker thread panicked"))?
    }
}

fn fetch_sample_blocking(
    base_url: &str,
    token: &str,
    timeout_seconds: u64,
    start_millis: i64,
    end_millis: i64,
) -> Result<FitnessSample> {
    let client = build_client(token, timeout_seconds)?;
    let fetch =
        |data_type: &str| aggregate(&client, base_url, data_type, start_millis, end_millis);

    Ok(FitnessSample {
        steps: sum_int(&fetch(STEPS)?).max(0) as u64,
        calories: sum_float(&fetch(CALORIES)?),
        active_minutes: sum_int(&fetch(ACTIVE_MINUTES)?).max(0) as u64,
        distance: sum_float(&fetch(DISTANCE)?),
    })
}

fn build_client(token: &str, timeout_seconds: u64) -> Result<Client> {
    if token.trim().is_empty() {
        bail!("Fitness access token is empty");
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Failed to build Authorization header")?,
    );

    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create fitness HTTP client")
}

fn aggregate(
    client: &Client,
    base_url: &str,
    data_type: &str,
    start_millis: i64,
    end_millis: i64,
) -> Result<AggregateResponse> {
    let endpoint = format!(
        "{}/users/me/dataset:aggregate",
        base_url.trim_end_matches('/')
    );
    let request_body = json!({
        "aggregateBy": [{ "dataTypeName": data_type }],
        "bucketByTime": { "durationMillis": DAY_MILLIS },
        "startTimeMillis": start_millis,
        "endTimeMillis": end_millis,
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .with_context(|| format!("Fitness request failed: {data_type}"))?;

    let status = response.status();
    let body = response
        .text()
        .context("Failed to read fitness response body")?;

    if !status.is_success() {
        bail!("Fitness API error {status} for {data_type}: {body}");
    }

    parse_aggregate(&body)
}

fn parse_aggregate(body: &str) -> Result<AggregateResponse> {
    serde_json::from_str(body).with_context(|| format!("Failed to parse fitness response: {body}"))
}

fn first_bucket_values(response: &AggregateResponse) -> impl Iterator<Item = &PointValue> {
    response
        .bucket
        .first()
        .and_then(|bucket| bucket.dataset.first())
        .into_iter()
        .flat_map(|dataset| dataset.point.iter())
        .filter_map(|point| point.value.first())
}

fn sum_int(response: &AggregateResponse) -> i64 {
    first_bucket_values(response)
        .map(|value| value.int_val.unwrap_or_default())
        .sum()
}

fn sum_float(response: &AggregateResponse) -> f64 {
    first_bucket_values(response)
        .map(|value| value.fp_val.unwrap_or_default())
        .sum()
}

fn local_day_bounds(date: NaiveDate) -> Result<(i64, i64)> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .context("Failed to build start of day")?;
    let start_millis = Local
        .from_local_datetime(&start)
        .earliest()
        .context("Failed to convert start of day to local time")?
        .timestamp_millis();
    let end_millis = start_millis + ChronoDuration::days(1).num_milliseconds();

    Ok((start_millis, end_millis))
}
