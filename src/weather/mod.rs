//! Weather collaborator boundary.
//!
//! The engine only ever sees a normalized [`WeatherReport`]; which provider
//! produced it, and how the city name was geocoded, is the source's problem.

mod condition;

pub use condition::{condition_label, is_good_weather};

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Normalized current-conditions snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Provider condition code, lowercased for wttr-style free text.
    pub condition_code: String,
    pub temperature: f32,
    pub apparent_temperature: f32,
    /// Relative humidity in percent, when the provider reports it.
    pub humidity: Option<f32>,
    pub aqi: Option<u32>,
    pub pm25: Option<f32>,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<WeatherReport>;
}

/// wttr.in-backed source. The provider geocodes the city name itself.
pub struct WttrSource {
    client: reqwest::Client,
}

impl WttrSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WttrSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WttrResponse {
    current_condition: Vec<WttrCondition>,
}

#[derive(Debug, Deserialize)]
struct WttrCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    humidity: String,
    #[serde(rename = "weatherDesc")]
    weather_desc: Vec<WttrValue>,
}

#[derive(Debug, Deserialize)]
struct WttrValue {
    value: String,
}

#[async_trait]
impl WeatherSource for WttrSource {
    async fn fetch(&self, city: &str) -> Result<WeatherReport> {
        let url = format!("https://wttr.in/{city}?format=j1");
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, "curl/8")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("weather request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("weather request returned {}", response.status()));
        }

        let payload: WttrResponse = response
            .json()
            .await
            .context("weather response was not valid JSON")?;
        let current = payload
            .current_condition
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("weather response had no current conditions"))?;

        let condition = current
            .weather_desc
            .into_iter()
            .next()
            .map(|value| value.value)
            .unwrap_or_default();

        Ok(WeatherReport {
            condition_code: condition.to_lowercase(),
            temperature: current
                .temp_c
                .parse()
                .context("temperature field was not numeric")?,
            apparent_temperature: current
                .feels_like_c
                .parse()
                .context("feels-like field was not numeric")?,
            humidity: current.humidity.parse().ok(),
            aqi: None,
            pm25: None,
        })
    }
}
