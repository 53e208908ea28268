//! Overpass API client for land-use lookups
//!
//! One request covers a whole batch. Each point's sub-query is preceded by a
//! `make` marker element carrying its position in the batch, so the flat
//! element list in the response can be split back into per-point groups.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use super::tags::FeatureTags;
use super::LandUseService;
use crate::error::ServiceError;

/// Element type of the per-point marker produced by `make`
pub const MARKER_TYPE: &str = "ridelens_marker";

/// Tag keys worth fetching; everything else is noise for classification
const QUERY_KEYS: &str = "^(surface|landuse|natural|leisure|place|highway)$";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub lat: f64,
    pub lon: f64,
}

/// South, west, north, east in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Land-use lookup for one batch of sampled points
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseQuery {
    pub points: Vec<QueryPoint>,
    pub radius_m: f64,
    pub timeout: Duration,
}

impl LandUseQuery {
    pub fn new(points: Vec<QueryPoint>, radius_m: f64, timeout: Duration) -> Self {
        Self {
            points,
            radius_m,
            timeout,
        }
    }

    /// Bounding box of the points, grown by the search radius on every side
    pub fn bbox(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let mut bbox = BoundingBox {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        for p in &self.points[1..] {
            bbox.south = bbox.south.min(p.lat);
            bbox.north = bbox.north.max(p.lat);
            bbox.west = bbox.west.min(p.lon);
            bbox.east = bbox.east.max(p.lon);
        }

        let lat_pad = self.radius_m / 111_320.0;
        let mid_lat = ((bbox.south + bbox.north) / 2.0).to_radians();
        let lon_pad = self.radius_m / (111_320.0 * mid_lat.cos().max(0.01));

        Some(BoundingBox {
            south: (bbox.south - lat_pad).max(-90.0),
            west: (bbox.west - lon_pad).max(-180.0),
            north: (bbox.north + lat_pad).min(90.0),
            east: (bbox.east + lon_pad).min(180.0),
        })
    }

    /// Overpass QL text for the whole batch
    pub fn to_overpass_ql(&self) -> String {
        let mut ql = format!("[out:json][timeout:{}]", self.timeout.as_secs().max(1));
        if let Some(b) = self.bbox() {
            let _ = write!(
                ql,
                "[bbox:{:.6},{:.6},{:.6},{:.6}]",
                b.south, b.west, b.north, b.east
            );
        }
        ql.push_str(";\n");

        for (i, p) in self.points.iter().enumerate() {
            let _ = writeln!(ql, "make {} index=\"{}\";\nout;", MARKER_TYPE, i);
            let _ = writeln!(
                ql,
                "(way(around:{r},{lat:.6},{lon:.6})[~\"{keys}\"~\".\"];\n \
                 relation(around:{r},{lat:.6},{lon:.6})[~\"{keys}\"~\".\"];\n \
                 node(around:{r},{lat:.6},{lon:.6})[place];);\nout tags;",
                r = self.radius_m,
                lat = p.lat,
                lon = p.lon,
                keys = QUERY_KEYS,
            );
        }

        ql
    }
}

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn malformed(endpoint: &str, reason: impl Into<String>) -> ServiceError {
    ServiceError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: reason.into(),
    }
}

/// Split the flat element list back into one feature group per query point.
///
/// Markers must appear in order 0..expected, with every feature following the
/// marker of the point it belongs to.
pub fn decompose_response(
    endpoint: &str,
    elements: &[OverpassElement],
    expected: usize,
) -> Result<Vec<Vec<FeatureTags>>, ServiceError> {
    let mut groups: Vec<Vec<FeatureTags>> = Vec::with_capacity(expected);

    for element in elements {
        if element.element_type == MARKER_TYPE {
            let index: usize = element
                .tags
                .get("index")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| malformed(endpoint, "marker without a usable index"))?;
            if index != groups.len() {
                return Err(malformed(
                    endpoint,
                    format!("marker {} where {} was expected", index, groups.len()),
                ));
            }
            groups.push(Vec::new());
            continue;
        }

        let group = groups
            .last_mut()
            .ok_or_else(|| malformed(endpoint, "feature before the first marker"))?;
        if !element.tags.is_empty() {
            group.push(
                element
                    .tags
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
            );
        }
    }

    if groups.len() != expected {
        return Err(malformed(
            endpoint,
            format!("{} groups for {} points", groups.len(), expected),
        ));
    }

    Ok(groups)
}

/// HTTP client for Overpass interpreter endpoints
pub struct OverpassClient {
    client: reqwest::Client,
}

impl OverpassClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OverpassClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LandUseService for OverpassClient {
    async fn query(
        &self,
        endpoint: &str,
        query: &LandUseQuery,
    ) -> Result<Vec<Vec<FeatureTags>>, ServiceError> {
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ServiceError::Timeout {
                    endpoint: endpoint.to_string(),
                    after: query.timeout,
                }
            } else {
                ServiceError::Request {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let ql = query.to_overpass_ql();
        debug!(endpoint, points = query.points.len(), "Overpass request");

        let response = self
            .client
            .post(endpoint)
            .timeout(query.timeout)
            .form(&[("data", ql)])
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(ServiceError::Request {
                endpoint: endpoint.to_string(),
                reason: format!("API returned status: {}", response.status()),
            });
        }

        let body: OverpassResponse = response.json().await.map_err(request_error)?;
        decompose_response(endpoint, &body.elements, query.points.len())
    }
}
