use async_trait::async_trait;
use chrono::Local;
use indoc::indoc;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::geocoding::{Coordinates, GeocodingClient, NOMINATIM_HOST, NO_LOCATION_FOUND};
use super::places::{PlacesClient, PLACES_HOST};
use super::toolkit::Toolkit;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Endpoints and credentials for the services behind the local guide tools
#[derive(Debug, Clone)]
pub struct LocalGuideConfig {
    pub geocoder_host: String,
    pub geocoder_user_agent: String,
    pub places_host: String,
    pub places_api_key: String,
    pub timeout_secs: u64,
}

impl LocalGuideConfig {
    pub fn new<K: Into<String>>(places_api_key: K) -> Self {
        Self {
            geocoder_host: NOMINATIM_HOST.to_string(),
            geocoder_user_agent: format!("wayfarer/{}", env!("CARGO_PKG_VERSION")),
            places_host: PLACES_HOST.to_string(),
            places_api_key: places_api_key.into(),
            timeout_secs: 60,
        }
    }
}

pub struct LocalGuideToolkit {
    tools: Vec<Tool>,
    geocoder: GeocodingClient,
    places: PlacesClient,
}

impl LocalGuideToolkit {
    pub const NAME: &'static str = "local_guide";

    pub fn new(config: LocalGuideConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Internal(format!("Could not build HTTP client: {}", e)))?;

        let current_time_tool = Tool::new(
            "current_time",
            "Get the current local date and time. Use it to tell whether a place is open now.",
            json!({
                "type": "object",
                "required": [],
                "properties": {}
            }),
        );

        let geocode_tool = Tool::new(
            "geocode",
            "Look up the latitude and longitude of a named location such as a city, \
            neighbourhood, landmark or street address.",
            json!({
                "type": "object",
                "required": ["location_name"],
                "properties": {
                    "location_name": {
                        "type": "string",
                        "description": "The place to locate, e.g. 'Shibuya, Tokyo'."
                    }
                }
            }),
        );

        let nearby_places_tool = Tool::new(
            "nearby_places",
            "Search for businesses near a coordinate and return their name, rating and opening hours.",
            json!({
                "type": "object",
                "required": ["latitude", "longitude", "query"],
                "properties": {
                    "latitude": {
                        "type": "number",
                        "description": "Latitude in decimal degrees, as returned by geocode."
                    },
                    "longitude": {
                        "type": "number",
                        "description": "Longitude in decimal degrees, as returned by geocode."
                    },
                    "query": {
                        "type": "string",
                        "description": "What to look for, e.g. 'ramen' or 'coffee shop'."
                    }
                }
            }),
        );

        Ok(Self {
            tools: vec![current_time_tool, geocode_tool, nearby_places_tool],
            geocoder: GeocodingClient::new(
                client.clone(),
                config.geocoder_host,
                config.geocoder_user_agent,
            ),
            places: PlacesClient::new(client, config.places_host, config.places_api_key),
        })
    }

    fn current_time(&self) -> AgentResult<Vec<Content>> {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        Ok(vec![Content::text(format!("Today is {}", now))])
    }

    async fn geocode(&self, params: Value) -> AgentResult<Vec<Content>> {
        let location_name = params
            .get("location_name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                AgentError::InvalidParameters("Missing 'location_name' parameter".into())
            })?;

        let text = match self.geocoder.locate(location_name).await? {
            Some(coordinates) => coordinates.to_string(),
            None => NO_LOCATION_FOUND.to_string(),
        };
        Ok(vec![Content::text(text)])
    }

    async fn nearby_places(&self, params: Value) -> AgentResult<Vec<Content>> {
        let coordinates = Coordinates {
            latitude: degrees_param(&params, "latitude")?,
            longitude: degrees_param(&params, "longitude")?,
        };
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("Missing 'query' parameter".into()))?;

        let places = self.places.nearby(coordinates, query).await?;
        let value = serde_json::to_value(&places)
            .map_err(|e| AgentError::Internal(format!("Could not serialize places: {}", e)))?;
        Ok(vec![Content::json(value)])
    }
}

/// Read a coordinate that the model may send either as a number or as numeric text
fn degrees_param(params: &Value, key: &str) -> AgentResult<f64> {
    let value = params
        .get(key)
        .ok_or_else(|| AgentError::InvalidParameters(format!("Missing '{}' parameter", key)))?;

    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        AgentError::InvalidParameters(format!("'{}' must be a number, got {}", key, value))
    })
}

#[async_trait]
impl Toolkit for LocalGuideToolkit {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Finds places to eat, drink and visit near a location, with ratings and opening hours."
    }

    fn instructions(&self) -> &str {
        indoc! {r#"
            To recommend places, first geocode the location the user mentions, then call
            nearby_places with the returned latitude and longitude and a short query.
            If the user asks about places that are open now, call current_time and compare
            it with the opening hours. If geocode reports that no location was found, ask the
            user to name a more specific location instead of guessing coordinates.
        "#}
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        info!(tool = %tool_call.name, "calling local guide tool");
        match tool_call.name.as_str() {
            "current_time" => self.current_time(),
            "geocode" => self.geocode(tool_call.arguments).await,
            "nearby_places" => self.nearby_places(tool_call.arguments).await,
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn toolkit(server: &MockServer) -> LocalGuideToolkit {
        LocalGuideToolkit::new(LocalGuideConfig {
            geocoder_host: server.uri(),
            geocoder_user_agent: "wayfarer-test".to_string(),
            places_host: server.uri(),
            places_api_key: "token".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_tool_names() {
        let toolkit = LocalGuideToolkit::new(LocalGuideConfig::new("token")).unwrap();
        let names: Vec<&str> = toolkit.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["current_time", "geocode", "nearby_places"]);
        assert_eq!(toolkit.name(), "local_guide");
    }

    #[tokio::test]
    async fn test_current_time() {
        let toolkit = LocalGuideToolkit::new(LocalGuideConfig::new("token")).unwrap();
        let result = toolkit
            .call(ToolCall::new("current_time", json!({})))
            .await
            .unwrap();

        let text = result[0].as_text().unwrap();
        assert!(text.starts_with("Today is "));
        // "YYYY-MM-DD HH:MM:SS"
        assert_eq!(text.trim_start_matches("Today is ").len(), 19);
    }

    #[tokio::test]
    async fn test_geocode_not_found_returns_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Nowhere Special"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let result = toolkit(&server)
            .call(ToolCall::new(
                "geocode",
                json!({"location_name": "Nowhere Special"}),
            ))
            .await
            .unwrap();

        assert_eq!(result, vec![Content::text(NO_LOCATION_FOUND)]);
    }

    #[tokio::test]
    async fn test_geocode_requires_location_name() {
        let server = MockServer::start().await;
        let error = toolkit(&server)
            .call(ToolCall::new("geocode", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_nearby_places_accepts_string_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "search_engine": "google_maps_search",
                "query": "coffee",
                "coordinates": {"latitude": "48.8566", "longitude": "2.3522"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsing": {"entities": {"SearchResult": [{"place_id": "c1"}]}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"search_engine": "google_maps_place"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsing": {"entities": {"Place": [{
                    "title": "Cafe de Flore",
                    "rating": "4.2",
                    "place_information": {"opening_hours": "07:30-01:30"}
                }]}}
            })))
            .mount(&server)
            .await;

        let result = toolkit(&server)
            .call(ToolCall::new(
                "nearby_places",
                json!({"latitude": "48.8566", "longitude": 2.3522, "query": "coffee"}),
            ))
            .await
            .unwrap();

        assert_eq!(
            result[0].as_json().unwrap(),
            &json!([{
                "name": "Cafe de Flore",
                "rating": "4.2",
                "opening_hours": "07:30-01:30"
            }])
        );
    }

    #[tokio::test]
    async fn test_nearby_places_bad_coordinate() {
        let server = MockServer::start().await;
        let error = toolkit(&server)
            .call(ToolCall::new(
                "nearby_places",
                json!({"latitude": "north", "longitude": 2.35, "query": "coffee"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let toolkit = LocalGuideToolkit::new(LocalGuideConfig::new("token")).unwrap();
        let error = toolkit
            .call(ToolCall::new("weather", json!({})))
            .await
            .unwrap_err();
        assert_eq!(error, AgentError::ToolNotFound("weather".to_string()));
    }
}
