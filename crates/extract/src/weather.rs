//! Weather providers for per-state enrichment. Both normalize to the same
//! record shape: state, temperature, condition, humidity, wind_speed,
//! feels_like, data_source. All readings are imperial units.

use shipdash_schema::RawRecord;

use crate::api::KeyedProvider;
use crate::error::ExtractError;
use crate::http::HttpClient;

const WEATHERAPI_URL: &str = "http://api.weatherapi.com/v1/current.json";
const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Representative city per state for city-based weather queries.
const STATE_CITIES: &[(&str, &str)] = &[
    ("AL", "Birmingham"),
    ("AK", "Anchorage"),
    ("AZ", "Phoenix"),
    ("AR", "Little Rock"),
    ("CA", "Los Angeles"),
    ("CO", "Denver"),
    ("CT", "Hartford"),
    ("DE", "Wilmington"),
    ("FL", "Miami"),
    ("GA", "Atlanta"),
    ("HI", "Honolulu"),
    ("ID", "Boise"),
    ("IL", "Chicago"),
    ("IN", "Indianapolis"),
    ("IA", "Des Moines"),
    ("KS", "Wichita"),
    ("KY", "Louisville"),
    ("LA", "New Orleans"),
    ("ME", "Portland"),
    ("MD", "Baltimore"),
    ("MA", "Boston"),
    ("MI", "Detroit"),
    ("MN", "Minneapolis"),
    ("MS", "Jackson"),
    ("MO", "Kansas City"),
    ("MT", "Billings"),
    ("NE", "Omaha"),
    ("NV", "Las Vegas"),
    ("NH", "Manchester"),
    ("NJ", "Newark"),
    ("NM", "Albuquerque"),
    ("NY", "New York"),
    ("NC", "Charlotte"),
    ("ND", "Fargo"),
    ("OH", "Columbus"),
    ("OK", "Oklahoma City"),
    ("OR", "Portland"),
    ("PA", "Philadelphia"),
    ("RI", "Providence"),
    ("SC", "Columbia"),
    ("SD", "Sioux Falls"),
    ("TN", "Memphis"),
    ("TX", "Houston"),
    ("UT", "Salt Lake City"),
    ("VT", "Burlington"),
    ("VA", "Virginia Beach"),
    ("WA", "Seattle"),
    ("WV", "Charleston"),
    ("WI", "Milwaukee"),
    ("WY", "Cheyenne"),
];

/// Centroid coordinates for the coordinate-based fallback provider.
const STATE_COORDS: &[(&str, f64, f64)] = &[
    ("CA", 36.7783, -119.4179),
    ("TX", 31.9686, -99.9018),
    ("FL", 27.6648, -81.5158),
    ("NY", 43.0, -75.0),
    ("PA", 41.2033, -77.1945),
    ("IL", 40.6331, -89.3985),
];

fn city_for(state: &str) -> &str {
    STATE_CITIES
        .iter()
        .find(|(code, _)| *code == state)
        .map(|(_, city)| *city)
        .unwrap_or(state)
}

// ---------------------------------------------------------------------------
// WeatherAPI.com (primary)
// ---------------------------------------------------------------------------

pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    client: HttpClient,
}

impl WeatherApiProvider {
    pub fn new(api_key: impl Into<String>, client: HttpClient) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: WEATHERAPI_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl KeyedProvider for WeatherApiProvider {
    fn provider_name(&self) -> &str {
        "WeatherAPI.com"
    }

    fn fetch(&self, key: &str) -> Result<RawRecord, ExtractError> {
        let q = format!("{}, {}, USA", city_for(key), key);
        let body = self.client.get_json(
            &self.base_url,
            &[("key", self.api_key.as_str()), ("q", &q), ("aqi", "no")],
        )?;

        let current = body
            .get("current")
            .ok_or_else(|| parse_err(key, "missing 'current' object"))?;

        Ok(reading(
            key,
            num(current, "temp_f").ok_or_else(|| parse_err(key, "missing temp_f"))?,
            current
                .pointer("/condition/text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| parse_err(key, "missing condition"))?
                .to_string(),
            num(current, "humidity").ok_or_else(|| parse_err(key, "missing humidity"))?,
            num(current, "wind_mph").ok_or_else(|| parse_err(key, "missing wind_mph"))?,
            num(current, "feelslike_f").ok_or_else(|| parse_err(key, "missing feelslike_f"))?,
            "WeatherAPI.com",
        ))
    }
}

// ---------------------------------------------------------------------------
// OpenWeather (fallback)
// ---------------------------------------------------------------------------

pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    client: HttpClient,
}

impl OpenWeatherProvider {
    pub fn new(api_key: impl Into<String>, client: HttpClient) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENWEATHER_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl KeyedProvider for OpenWeatherProvider {
    fn provider_name(&self) -> &str {
        "OpenWeather"
    }

    fn fetch(&self, key: &str) -> Result<RawRecord, ExtractError> {
        let (_, lat, lon) = STATE_COORDS
            .iter()
            .find(|(code, _, _)| *code == key)
            .ok_or_else(|| {
                ExtractError::SourceUnavailable(format!("no coordinates for {key}"))
            })?;

        let lat = lat.to_string();
        let lon = lon.to_string();
        let body = self.client.get_json(
            &self.base_url,
            &[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "imperial"),
            ],
        )?;

        let main = body
            .get("main")
            .ok_or_else(|| parse_err(key, "missing 'main' object"))?;
        let description = body
            .pointer("/weather/0/description")
            .and_then(|v| v.as_str())
            .ok_or_else(|| parse_err(key, "missing weather description"))?;

        Ok(reading(
            key,
            num(main, "temp").ok_or_else(|| parse_err(key, "missing temp"))?,
            title_case(description),
            num(main, "humidity").ok_or_else(|| parse_err(key, "missing humidity"))?,
            body.pointer("/wind/speed").and_then(|v| v.as_f64()).unwrap_or(0.0),
            num(main, "feels_like").ok_or_else(|| parse_err(key, "missing feels_like"))?,
            "OpenWeather",
        ))
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn reading(
    state: &str,
    temperature: f64,
    condition: String,
    humidity: f64,
    wind_speed: f64,
    feels_like: f64,
    source: &str,
) -> RawRecord {
    RawRecord::from([
        ("state".to_string(), serde_json::json!(state)),
        ("temperature".to_string(), serde_json::json!(temperature)),
        ("condition".to_string(), serde_json::json!(condition)),
        ("humidity".to_string(), serde_json::json!(humidity)),
        ("wind_speed".to_string(), serde_json::json!(wind_speed)),
        ("feels_like".to_string(), serde_json::json!(feels_like)),
        ("data_source".to_string(), serde_json::json!(source)),
    ])
}

fn num(v: &serde_json::Value, field: &str) -> Option<f64> {
    v.get(field).and_then(|v| v.as_f64())
}

fn parse_err(key: &str, what: &str) -> ExtractError {
    ExtractError::Parse(format!("weather response for {key}: {what}"))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
