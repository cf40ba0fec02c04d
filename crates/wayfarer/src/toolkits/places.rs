use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::geocoding::Coordinates;
use crate::errors::{AgentError, AgentResult};

pub const PLACES_HOST: &str = "https://api.webit.live";

/// A business as reported by the place directory. Fields the directory omits are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: String,
    pub rating: String,
    pub opening_hours: String,
}

/// Client for the realtime SERP API used to search map listings
#[derive(Debug, Clone)]
pub struct PlacesClient {
    client: Client,
    host: String,
    api_key: String,
}

impl PlacesClient {
    pub fn new(client: Client, host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
        }
    }

    async fn serp(&self, body: Value) -> AgentResult<Value> {
        let url = format!("{}/api/v1/realtime/serp", self.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Place lookup failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ExecutionError(format!(
                "Place directory returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            AgentError::ExecutionError(format!("Could not parse place directory response: {}", e))
        })
    }

    /// Find the ids of places matching `query` around the given coordinates
    pub async fn search(&self, coordinates: Coordinates, query: &str) -> AgentResult<Vec<String>> {
        debug!(%query, latitude = coordinates.latitude, longitude = coordinates.longitude, "place search");
        let body = json!({
            "parse": true,
            "search_engine": "google_maps_search",
            "query": query,
            "coordinates": {
                "latitude": coordinates.latitude.to_string(),
                "longitude": coordinates.longitude.to_string(),
            },
            "locale": "en",
        });

        let response = self.serp(body).await?;
        let ids = response["parsing"]["entities"]["SearchResult"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|result| result.get("place_id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Fetch the details of one place
    pub async fn details(&self, place_id: &str) -> AgentResult<PlaceRecord> {
        let body = json!({
            "parse": true,
            "search_engine": "google_maps_place",
            "place_id": place_id,
            "domain": "com",
            "format": "json",
            "render": true,
            "country": "US",
            "locale": "en",
        });

        let response = self.serp(body).await?;
        let place = response["parsing"]["entities"]["Place"]
            .as_array()
            .and_then(|places| places.first())
            .ok_or_else(|| {
                AgentError::ExecutionError(format!("No details returned for place {}", place_id))
            })?;

        Ok(PlaceRecord {
            name: field_text(&place["title"]),
            rating: field_text(&place["rating"]),
            opening_hours: field_text(&place["place_information"]["opening_hours"]),
        })
    }

    /// Search near `coordinates` and fetch every hit's details concurrently
    pub async fn nearby(&self, coordinates: Coordinates, query: &str) -> AgentResult<Vec<PlaceRecord>> {
        let ids = self.search(coordinates, query).await?;
        if ids.is_empty() {
            return Err(AgentError::NoResultsFound(format!(
                "No places matching '{}' near {}",
                query, coordinates
            )));
        }

        try_join_all(ids.iter().map(|id| self.details(id))).await
    }
}

// Ratings and hours arrive as strings, numbers or structured values depending on the listing
fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test_token";

    fn client(server: &MockServer) -> PlacesClient {
        PlacesClient::new(Client::new(), server.uri(), TOKEN)
    }

    async fn mount_search(server: &MockServer, ids: &[&str]) {
        let results: Vec<Value> = ids.iter().map(|id| json!({"place_id": id})).collect();
        Mock::given(method("POST"))
            .and(path("/api/v1/realtime/serp"))
            .and(header("Authorization", "Basic test_token"))
            .and(body_partial_json(json!({"search_engine": "google_maps_search"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsing": {"entities": {"SearchResult": results}}
            })))
            .mount(server)
            .await;
    }

    async fn mount_place(server: &MockServer, id: &str, title: &str) {
        Mock::given(method("POST"))
            .and(path("/api/v1/realtime/serp"))
            .and(body_partial_json(json!({"search_engine": "google_maps_place", "place_id": id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsing": {"entities": {"Place": [{
                    "title": title,
                    "rating": 4.5,
                    "place_information": {"opening_hours": "11:00-22:00"}
                }]}}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn shibuya() -> Coordinates {
        Coordinates {
            latitude: 35.6581,
            longitude: 139.7017,
        }
    }

    #[tokio::test]
    async fn test_nearby_fetches_every_place() {
        let server = MockServer::start().await;
        mount_search(&server, &["p1", "p2", "p3"]).await;
        mount_place(&server, "p1", "Ichiran").await;
        mount_place(&server, "p2", "Afuri").await;
        mount_place(&server, "p3", "Nagi").await;

        let places = client(&server).nearby(shibuya(), "ramen").await.unwrap();

        assert_eq!(places.len(), 3);
        assert_eq!(
            places[0],
            PlaceRecord {
                name: "Ichiran".to_string(),
                rating: "4.5".to_string(),
                opening_hours: "11:00-22:00".to_string(),
            }
        );
        let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ichiran", "Afuri", "Nagi"]);
    }

    #[tokio::test]
    async fn test_nearby_without_results() {
        let server = MockServer::start().await;
        mount_search(&server, &[]).await;

        let error = client(&server).nearby(shibuya(), "ramen").await.unwrap_err();
        assert!(matches!(error, AgentError::NoResultsFound(_)));
    }

    #[tokio::test]
    async fn test_details_missing_fields_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/realtime/serp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsing": {"entities": {"Place": [{"title": "Quiet Cafe"}]}}
            })))
            .mount(&server)
            .await;

        let place = client(&server).details("p9").await.unwrap();
        assert_eq!(place.name, "Quiet Cafe");
        assert_eq!(place.rating, "");
        assert_eq!(place.opening_hours, "");
    }

    #[tokio::test]
    async fn test_unauthorized_is_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let error = client(&server).search(shibuya(), "ramen").await.unwrap_err();
        match error {
            AgentError::ExecutionError(msg) => assert!(msg.contains("bad token")),
            other => panic!("Expected ExecutionError, got {:?}", other),
        }
    }
}
