use crate::types::FacilityRecord;
use anyhow::{Result, anyhow, bail};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;

// Points are stored by position in the source list so results can be
// returned in file order.
struct FacilityPoint {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for FacilityPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

pub struct FacilityIndex {
    tree: RTree<FacilityPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Parse `min_lon,min_lat,max_lon,max_lat`.
    pub fn parse(value: &str) -> Result<Self> {
        let parts = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| anyhow!("Invalid bbox '{}': {}", value, e))?;

        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            bail!("Invalid bbox '{}': expected 4 values, got {}", value, parts.len());
        };
        if parts.iter().any(|v| !v.is_finite()) {
            bail!("Invalid bbox '{}': values must be finite", value);
        }
        if min_lon > max_lon || min_lat > max_lat {
            bail!("Invalid bbox '{}': min exceeds max", value);
        }

        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lon, self.min_lat], [self.max_lon, self.max_lat])
    }
}

impl FacilityIndex {
    pub fn build(records: &[FacilityRecord]) -> Self {
        let points = records.iter().enumerate()
            .map(|(index, r)| FacilityPoint { index, position: [r.lon, r.lat] })
            .collect();
        Self { tree: RTree::bulk_load(points) }
    }

    /// Records inside `bbox` (edges included), in the order of `records`.
    pub fn within<'a>(&self, records: &'a [FacilityRecord], bbox: &BoundingBox) -> Vec<&'a FacilityRecord> {
        let mut hits: Vec<usize> = self.tree
            .locate_in_envelope(&bbox.envelope())
            .map(|p| p.index)
            .collect();
        hits.sort_unstable();
        hits.into_iter().filter_map(|i| records.get(i)).collect()
    }
}
