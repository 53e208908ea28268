//! Closed record of the land-use tags the classifier understands

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tags of one geographic feature.
///
/// Keys the rule table reads get their own field; everything else lands in
/// `unrecognized` so nothing is silently lost.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureTags {
    pub surface: Option<String>,
    pub landuse: Option<String>,
    pub natural: Option<String>,
    pub leisure: Option<String>,
    pub place: Option<String>,
    pub highway: Option<String>,
    pub name: Option<String>,
    pub unrecognized: BTreeMap<String, String>,
}

impl FeatureTags {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut tags = FeatureTags::default();

        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            let slot = match key.as_str() {
                "surface" => Some(&mut tags.surface),
                "landuse" => Some(&mut tags.landuse),
                "natural" => Some(&mut tags.natural),
                "leisure" => Some(&mut tags.leisure),
                "place" => Some(&mut tags.place),
                "highway" => Some(&mut tags.highway),
                "name" => Some(&mut tags.name),
                _ => None,
            };
            match slot {
                Some(slot) => *slot = Some(value),
                None => {
                    tags.unrecognized.insert(key, value);
                }
            }
        }

        tags
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FeatureTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FeatureTags::from_pairs(iter)
    }
}
