//! Terrain classification along a route
//!
//! The route is sampled at a fixed stride, the samples are looked up in
//! batches against a land-use service and each sample's label covers the
//! stretch up to the next sample. Service trouble never reaches the caller:
//! failed batches degrade to `Unknown`, and a response that cannot be mapped
//! back to the route switches the whole run to the elevation heuristic.

pub mod fallback;
pub mod overpass;
pub mod retry;
pub mod rules;
pub mod tags;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TerrainConfig;
use crate::error::ServiceError;
use crate::geodesy;
use crate::models::{
    ElevationProfile, TerrainAnalysis, TerrainSegment, TerrainShare, TerrainType, TrackPoint,
};

pub use overpass::{LandUseQuery, OverpassClient, QueryPoint};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use tags::FeatureTags;

/// External land-use lookup.
///
/// Returns one feature group per query point, in query order. An empty group
/// means nothing was found near that point.
#[async_trait]
pub trait LandUseService: Send + Sync {
    async fn query(
        &self,
        endpoint: &str,
        query: &LandUseQuery,
    ) -> Result<Vec<Vec<FeatureTags>>, ServiceError>;
}

#[async_trait]
impl<T: LandUseService + ?Sized> LandUseService for Arc<T> {
    async fn query(
        &self,
        endpoint: &str,
        query: &LandUseQuery,
    ) -> Result<Vec<Vec<FeatureTags>>, ServiceError> {
        (**self).query(endpoint, query).await
    }
}

/// Terrain label attached to one sampled point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLabel {
    pub index: usize,
    pub terrain_type: TerrainType,
    pub confidence: f64,
}

/// Every `stride`-th index, always ending with the last point
pub fn sample_indices(len: usize, stride: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..len).step_by(stride.max(1)).collect();
    if indices.last() != Some(&(len - 1)) {
        indices.push(len - 1);
    }
    indices
}

/// One segment per sample, running to the next sample, then merged
pub fn build_segments(points: &[TrackPoint], labels: &[SampleLabel]) -> Vec<TerrainSegment> {
    let cumulative = geodesy::cumulative_distances(points);

    let raw = labels.iter().enumerate().map(|(k, label)| {
        let end_index = labels.get(k + 1).map_or(label.index, |next| next.index);
        TerrainSegment {
            start_index: label.index,
            end_index,
            distance_m: cumulative[end_index] - cumulative[label.index],
            terrain_type: label.terrain_type,
            elevation_m: points[label.index].elevation.unwrap_or(0.0),
            confidence: label.confidence,
        }
    });

    merge_terrain_segments(raw)
}

/// Running merge of neighbours that share a terrain type
pub fn merge_terrain_segments(
    segments: impl IntoIterator<Item = TerrainSegment>,
) -> Vec<TerrainSegment> {
    let mut merged: Vec<TerrainSegment> = Vec::new();

    for segment in segments {
        match merged.last_mut() {
            Some(current) if current.terrain_type == segment.terrain_type => {
                let total = current.distance_m + segment.distance_m;
                current.confidence = if total > 0.0 {
                    (current.confidence * current.distance_m + segment.confidence * segment.distance_m)
                        / total
                } else {
                    (current.confidence + segment.confidence) / 2.0
                };
                current.distance_m = total;
                current.end_index = segment.end_index;
            }
            _ => merged.push(segment),
        }
    }

    merged
}

/// Distribution, dominant type and elevation profile for finished segments
pub fn summarize(
    points: &[TrackPoint],
    segments: Vec<TerrainSegment>,
    used_fallback: bool,
) -> TerrainAnalysis {
    let total: f64 = segments.iter().map(|s| s.distance_m).sum();

    let distribution: Vec<TerrainShare> = TerrainType::ALL
        .iter()
        .filter_map(|&terrain_type| {
            let of_type: Vec<&TerrainSegment> = segments
                .iter()
                .filter(|s| s.terrain_type == terrain_type)
                .collect();
            if of_type.is_empty() {
                return None;
            }
            let distance_m: f64 = of_type.iter().map(|s| s.distance_m).sum();
            Some(TerrainShare {
                terrain_type,
                distance_m,
                percentage: if total > 0.0 {
                    distance_m / total * 100.0
                } else {
                    0.0
                },
            })
        })
        .collect();

    let dominant_terrain = if total > 0.0 {
        distribution
            .iter()
            .fold(None::<&TerrainShare>, |best, share| match best {
                Some(b) if b.distance_m >= share.distance_m => Some(b),
                _ => Some(share),
            })
            .map_or(TerrainType::Unknown, |s| s.terrain_type)
    } else {
        segments
            .first()
            .map_or(TerrainType::Unknown, |s| s.terrain_type)
    };

    TerrainAnalysis {
        segments,
        dominant_terrain,
        distribution,
        elevation_profile: elevation_profile(points),
        used_fallback,
    }
}

fn elevation_profile(points: &[TrackPoint]) -> ElevationProfile {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
    if elevations.is_empty() {
        return ElevationProfile::default();
    }

    let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let climbed: f64 = elevations.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let distance = geodesy::cumulative_distances(points)
        .last()
        .copied()
        .unwrap_or(0.0);

    ElevationProfile {
        min,
        max,
        range: max - min,
        avg_slope: if distance > 0.0 {
            climbed / distance * 100.0
        } else {
            0.0
        },
    }
}

/// Whole-route analysis from the elevation heuristic alone
pub fn fallback_analysis(points: &[TrackPoint], config: &TerrainConfig) -> TerrainAnalysis {
    if points.is_empty() {
        return TerrainAnalysis {
            used_fallback: true,
            ..TerrainAnalysis::empty()
        };
    }

    let samples = sample_indices(points.len(), config.sample_stride);
    let labels = fallback::label_samples(points, &samples);
    summarize(points, build_segments(points, &labels), true)
}

/// Drives sampling, batched lookups, retries and the fallback switch
pub struct TerrainClassifier<'a, S> {
    config: &'a TerrainConfig,
    service: S,
}

impl<'a> TerrainClassifier<'a, OverpassClient> {
    pub fn with_overpass(config: &'a TerrainConfig) -> Self {
        Self::new(config, OverpassClient::new())
    }
}

impl<'a, S: LandUseService> TerrainClassifier<'a, S> {
    pub fn new(config: &'a TerrainConfig, service: S) -> Self {
        Self { config, service }
    }

    /// Classify the route. Never fails; the worst case is `Unknown` segments
    /// or the elevation heuristic.
    pub async fn classify(&self, points: &[TrackPoint]) -> TerrainAnalysis {
        if points.is_empty() {
            return TerrainAnalysis::empty();
        }

        if !self.config.enable_api_calls || self.config.endpoints.is_empty() {
            info!("Land-use lookups disabled, using elevation heuristic");
            return fallback_analysis(points, self.config);
        }

        let samples = sample_indices(points.len(), self.config.sample_stride);
        match self.label_samples(points, &samples).await {
            Ok(labels) => {
                let analysis = summarize(points, build_segments(points, &labels), false);
                info!(
                    segments = analysis.segments.len(),
                    dominant = %analysis.dominant_terrain,
                    "Terrain classified"
                );
                analysis
            }
            Err(e) => {
                warn!(error = %e, "Land-use response unusable, using elevation heuristic");
                fallback_analysis(points, self.config)
            }
        }
    }

    async fn label_samples(
        &self,
        points: &[TrackPoint],
        samples: &[usize],
    ) -> Result<Vec<SampleLabel>, ServiceError> {
        let mut labels = Vec::with_capacity(samples.len());
        let batch_size = self.config.batch_size.max(1);

        for (batch_no, batch) in samples.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.config.inter_batch_delay()).await;
            }

            let endpoint = &self.config.endpoints[batch_no % self.config.endpoints.len()];
            let query = LandUseQuery::new(
                batch
                    .iter()
                    .map(|&i| QueryPoint {
                        lat: points[i].lat,
                        lon: points[i].lon,
                    })
                    .collect(),
                self.config.query_radius_m,
                self.config.request_timeout(),
            );

            let groups = self.query_batch(endpoint, &query).await?;
            labels.extend(batch.iter().zip(groups.iter()).map(|(&index, features)| {
                let (terrain_type, confidence) = rules::classify_features(features);
                SampleLabel {
                    index,
                    terrain_type,
                    confidence,
                }
            }));
        }

        debug!(samples = samples.len(), "Land-use lookups complete");
        Ok(labels)
    }

    /// One batch with timeout and retries. Retryable failures that run out of
    /// attempts give empty groups; anything else is returned as an error.
    async fn query_batch(
        &self,
        endpoint: &str,
        query: &LandUseQuery,
    ) -> Result<Vec<Vec<FeatureTags>>, ServiceError> {
        let expected = query.points.len();
        let mut retry = RetryState::new(RetryPolicy::from_config(self.config));

        loop {
            let outcome =
                match tokio::time::timeout(query.timeout, self.service.query(endpoint, query)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::Timeout {
                        endpoint: endpoint.to_string(),
                        after: query.timeout,
                    }),
                };

            let error = match outcome {
                Ok(groups) if groups.len() == expected => return Ok(groups),
                Ok(groups) => ServiceError::MalformedResponse {
                    endpoint: endpoint.to_string(),
                    reason: format!("{} groups for {} points", groups.len(), expected),
                },
                Err(e) => e,
            };

            match retry.on_failure(&error) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        endpoint,
                        attempt = retry.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Land-use query failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!(endpoint, error = %error, "Land-use batch degraded to no data");
                    return Ok(vec![Vec::new(); expected]);
                }
                RetryDecision::Escalate => return Err(error),
            }
        }
    }
}
