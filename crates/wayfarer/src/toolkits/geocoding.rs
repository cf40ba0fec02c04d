use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};

pub const NOMINATIM_HOST: &str = "https://nominatim.openstreetmap.org";

/// Returned to the model in place of coordinates when the geocoder knows nothing
/// about the requested place.
pub const NO_LOCATION_FOUND: &str = "No location found, ask me about a specific location.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Latitude: {}, Longitude: {}", self.latitude, self.longitude)
    }
}

// Nominatim encodes both coordinates as strings
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Client for a Nominatim-compatible `/search` endpoint
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: Client,
    host: String,
    user_agent: String,
}

impl GeocodingClient {
    pub fn new(client: Client, host: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Resolve a free-text place name to the coordinates of the best match, if any
    pub async fn locate(&self, location_name: &str) -> AgentResult<Option<Coordinates>> {
        let url = format!("{}/search", self.host.trim_end_matches('/'));
        debug!(location = %location_name, "geocoding request");

        let response = self
            .client
            .get(&url)
            .query(&[("q", location_name), ("format", "json"), ("limit", "1")])
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Geocoding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ExecutionError(format!(
                "Geocoding service returned {}: {}",
                status, body
            )));
        }

        let hits: Vec<SearchHit> = response.json().await.map_err(|e| {
            AgentError::ExecutionError(format!("Could not parse geocoding response: {}", e))
        })?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(Coordinates {
            latitude: parse_degrees(&hit.lat)?,
            longitude: parse_degrees(&hit.lon)?,
        }))
    }
}

fn parse_degrees(value: &str) -> AgentResult<f64> {
    value.trim().parse().map_err(|_| {
        AgentError::ExecutionError(format!("Geocoding service returned a bad coordinate: {}", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(response: ResponseTemplate) -> (MockServer, GeocodingClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .and(query_param("limit", "1"))
            .and(header("User-Agent", "wayfarer-test"))
            .respond_with(response)
            .mount(&server)
            .await;

        let client = GeocodingClient::new(Client::new(), server.uri(), "wayfarer-test");
        (server, client)
    }

    #[tokio::test]
    async fn test_locate_first_hit() {
        let (_server, client) = setup(ResponseTemplate::new(200).set_body_json(json!([
            {"lat": "35.6581", "lon": "139.7017", "display_name": "Shibuya"}
        ])))
        .await;

        let coordinates = client.locate("Shibuya").await.unwrap().unwrap();
        assert_eq!(coordinates.latitude, 35.6581);
        assert_eq!(coordinates.longitude, 139.7017);
        assert_eq!(
            coordinates.to_string(),
            "Latitude: 35.6581, Longitude: 139.7017"
        );
    }

    #[tokio::test]
    async fn test_locate_no_hits() {
        let (_server, client) = setup(ResponseTemplate::new(200).set_body_json(json!([]))).await;
        assert_eq!(client.locate("Atlantis").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_locate_server_error() {
        let (_server, client) = setup(ResponseTemplate::new(503)).await;
        let error = client.locate("Shibuya").await.unwrap_err();
        assert!(matches!(error, AgentError::ExecutionError(_)));
    }
}
