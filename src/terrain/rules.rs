//! Ordered tag-to-terrain rule table
//!
//! Rules are tried in order across all features near a point; the first rule
//! that matches any feature decides the label.

use super::tags::FeatureTags;
use crate::models::TerrainType;

/// Confidence of a label backed by service data
pub const SERVICE_CONFIDENCE: f64 = 0.8;
/// Features were returned but no rule matched
pub const UNMATCHED_CONFIDENCE: f64 = 0.3;
/// Nothing was returned for the point
pub const NO_DATA_CONFIDENCE: f64 = 0.2;

pub type Rule = fn(&FeatureTags) -> Option<TerrainType>;

/// Rule names and predicates, in priority order
pub const RULES: [(&str, Rule); 6] = [
    ("surface", by_surface),
    ("landuse", by_landuse),
    ("natural", by_natural),
    ("leisure", by_leisure),
    ("place", by_place),
    ("highway", by_highway),
];

fn by_surface(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.surface.as_deref()? {
        "sand" => Some(TerrainType::Coastal),
        "gravel" | "fine_gravel" | "compacted" | "unpaved" | "dirt" | "ground" | "earth"
        | "mud" | "grass" => Some(TerrainType::Rural),
        _ => None,
    }
}

fn by_landuse(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.landuse.as_deref()? {
        "residential" => Some(TerrainType::Suburban),
        "commercial" | "retail" | "industrial" | "construction" | "railway" => {
            Some(TerrainType::Urban)
        }
        "forest" => Some(TerrainType::Forest),
        "farmland" | "farmyard" | "meadow" | "orchard" | "vineyard" | "allotments"
        | "greenhouse_horticulture" => Some(TerrainType::Agricultural),
        "grass" | "recreation_ground" | "village_green" => Some(TerrainType::Park),
        "reservoir" | "basin" => Some(TerrainType::Water),
        _ => None,
    }
}

fn by_natural(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.natural.as_deref()? {
        "wood" => Some(TerrainType::Forest),
        "water" | "wetland" | "spring" => Some(TerrainType::Water),
        "beach" | "coastline" | "bay" | "cape" => Some(TerrainType::Coastal),
        "peak" | "ridge" | "cliff" | "bare_rock" | "scree" | "glacier" | "saddle" => {
            Some(TerrainType::Mountain)
        }
        "sand" | "desert" => Some(TerrainType::Desert),
        "heath" | "grassland" | "scrub" => Some(TerrainType::Rural),
        _ => None,
    }
}

fn by_leisure(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.leisure.as_deref()? {
        "park" | "garden" | "nature_reserve" | "golf_course" | "common" | "playground" => {
            Some(TerrainType::Park)
        }
        _ => None,
    }
}

fn by_place(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.place.as_deref()? {
        "city" | "town" | "borough" => Some(TerrainType::Urban),
        "suburb" | "neighbourhood" | "quarter" => Some(TerrainType::Suburban),
        "village" | "hamlet" | "isolated_dwelling" | "farm" | "locality" => {
            Some(TerrainType::Rural)
        }
        _ => None,
    }
}

fn by_highway(tags: &FeatureTags) -> Option<TerrainType> {
    match tags.highway.as_deref()? {
        "primary" | "secondary" | "tertiary" | "pedestrian" | "service" | "trunk"
        | "motorway" => Some(TerrainType::Urban),
        "residential" | "living_street" | "cycleway" => Some(TerrainType::Suburban),
        "track" | "path" | "bridleway" | "unclassified" => Some(TerrainType::Rural),
        _ => None,
    }
}

/// Label and confidence for the features found around one point
pub fn classify_features(features: &[FeatureTags]) -> (TerrainType, f64) {
    if features.is_empty() {
        return (TerrainType::Unknown, NO_DATA_CONFIDENCE);
    }

    for (_, rule) in RULES.iter() {
        if let Some(terrain) = features.iter().find_map(rule) {
            return (terrain, SERVICE_CONFIDENCE);
        }
    }

    (TerrainType::Unknown, UNMATCHED_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> FeatureTags {
        FeatureTags::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_each_rule_in_isolation() {
        let cases = [
            (tags(&[("surface", "gravel")]), TerrainType::Rural),
            (tags(&[("landuse", "forest")]), TerrainType::Forest),
            (tags(&[("natural", "beach")]), TerrainType::Coastal),
            (tags(&[("leisure", "park")]), TerrainType::Park),
            (tags(&[("place", "town")]), TerrainType::Urban),
            (tags(&[("highway", "track")]), TerrainType::Rural),
        ];

        for (feature, expected) in cases {
            assert_eq!(classify_features(&[feature]), (expected, SERVICE_CONFIDENCE));
        }
    }

    #[test]
    fn test_rule_order_beats_feature_order() {
        // The highway feature comes first but landuse outranks highway
        let features = [
            tags(&[("highway", "primary")]),
            tags(&[("landuse", "farmland")]),
        ];
        assert_eq!(classify_features(&features).0, TerrainType::Agricultural);
    }

    #[test]
    fn test_surface_outranks_landuse_on_same_feature() {
        let feature = tags(&[("landuse", "residential"), ("surface", "dirt")]);
        assert_eq!(classify_features(&[feature]).0, TerrainType::Rural);
    }

    #[test]
    fn test_paved_surface_falls_through() {
        let feature = tags(&[("surface", "asphalt"), ("highway", "residential")]);
        assert_eq!(classify_features(&[feature]).0, TerrainType::Suburban);
    }

    #[test]
    fn test_unmatched_and_empty() {
        let unmatched = [tags(&[("amenity", "bench")])];
        assert_eq!(
            classify_features(&unmatched),
            (TerrainType::Unknown, UNMATCHED_CONFIDENCE)
        );
        assert_eq!(classify_features(&[]), (TerrainType::Unknown, NO_DATA_CONFIDENCE));
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<&str> = RULES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["surface", "landuse", "natural", "leisure", "place", "highway"]);
    }
}
