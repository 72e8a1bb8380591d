use serde::{Deserialize, Serialize};

use crate::bounds::Extent;
use crate::error::InvalidGeometry;
use crate::math::projection::project_xy;
use crate::spatial_ref::SpatialReference;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl Point {
    pub fn new(x: f64, y: f64, sr: SpatialReference) -> Self {
        Self {
            x,
            y,
            spatial_reference: sr,
        }
    }

    pub fn project(&self, to: SpatialReference) -> Result<Point, InvalidGeometry> {
        let from = self.spatial_reference;
        let (x, y) =
            project_xy(self.x, self.y, &from, &to).ok_or(InvalidGeometry::Unprojectable { from, to })?;
        Ok(Point::new(x, y, to))
    }
}

/// Closed linear ring as `[x, y]` pairs.
pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub rings: Vec<Ring>,
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl Polygon {
    pub fn new(rings: Vec<Ring>, sr: SpatialReference) -> Self {
        Self {
            rings,
            spatial_reference: sr,
        }
    }

    /// Five-vertex closed ring covering `extent`.
    pub fn from_extent(extent: &Extent) -> Self {
        let ring = vec![
            [extent.xmin, extent.ymin],
            [extent.xmin, extent.ymax],
            [extent.xmax, extent.ymax],
            [extent.xmax, extent.ymin],
            [extent.xmin, extent.ymin],
        ];
        Self::new(vec![ring], extent.spatial_reference)
    }

    /// Validate and return a copy whose rings are all explicitly closed.
    pub fn closed(&self) -> Result<Polygon, InvalidGeometry> {
        if self.rings.is_empty() {
            return Err(InvalidGeometry::Empty);
        }

        let mut rings = Vec::with_capacity(self.rings.len());
        for (i, ring) in self.rings.iter().enumerate() {
            if ring.iter().flatten().any(|c| !c.is_finite()) {
                return Err(InvalidGeometry::NonFinite);
            }

            let mut ring = ring.clone();
            if ring.len() >= 2 && ring.first() == ring.last() {
                ring.pop();
            }
            let distinct = count_distinct(&ring, 3);
            if distinct < 3 {
                return Err(InvalidGeometry::DegenerateRing {
                    ring: i,
                    vertices: distinct,
                });
            }
            ring.push(ring[0]);
            rings.push(ring);
        }

        Ok(Polygon::new(rings, self.spatial_reference))
    }

    pub fn validate(&self) -> Result<(), InvalidGeometry> {
        self.closed().map(|_| ())
    }

    pub fn extent(&self) -> Option<Extent> {
        let mut it = self.rings.iter().flatten();
        let first = it.next()?;
        let mut e = Extent::new(first[0], first[1], first[0], first[1], self.spatial_reference);
        for p in it {
            e.xmin = e.xmin.min(p[0]);
            e.ymin = e.ymin.min(p[1]);
            e.xmax = e.xmax.max(p[0]);
            e.ymax = e.ymax.max(p[1]);
        }
        Some(e)
    }

    /// Even-odd containment across all rings, so inner rings act as holes.
    ///
    /// The point is projected into this polygon's reference first; an
    /// unprojectable point is never contained.
    pub fn contains(&self, point: &Point) -> bool {
        let Ok(p) = point.project(self.spatial_reference) else {
            return false;
        };
        let mut inside = false;
        for ring in &self.rings {
            if ring_crossings_odd(ring, p.x, p.y) {
                inside = !inside;
            }
        }
        inside
    }

    pub fn project(&self, to: SpatialReference) -> Result<Polygon, InvalidGeometry> {
        let from = self.spatial_reference;
        if from.is_equivalent(&to) {
            return Ok(Polygon::new(self.rings.clone(), to));
        }
        let mut rings = Vec::with_capacity(self.rings.len());
        for ring in &self.rings {
            let mut out = Vec::with_capacity(ring.len());
            for [x, y] in ring {
                let (px, py) =
                    project_xy(*x, *y, &from, &to).ok_or(InvalidGeometry::Unprojectable { from, to })?;
                out.push([px, py]);
            }
            rings.push(out);
        }
        Ok(Polygon::new(rings, to))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub paths: Vec<Vec<[f64; 2]>>,
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Point(Point),
    Polyline(Polyline),
    Polygon(Polygon),
}

impl Geometry {
    pub fn spatial_reference(&self) -> SpatialReference {
        match self {
            Geometry::Point(p) => p.spatial_reference,
            Geometry::Polyline(l) => l.spatial_reference,
            Geometry::Polygon(p) => p.spatial_reference,
        }
    }

    /// Representative point: the point itself, the first vertex of a line,
    /// or the vertex average of a polygon's outer ring.
    pub fn anchor(&self) -> Option<Point> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polyline(l) => {
                let [x, y] = *l.paths.first()?.first()?;
                Some(Point::new(x, y, l.spatial_reference))
            }
            Geometry::Polygon(p) => {
                let outer = p.rings.first()?;
                let mut pts: &[[f64; 2]] = outer;
                if pts.len() >= 2 && pts.first() == pts.last() {
                    pts = &pts[..pts.len() - 1];
                }
                if pts.is_empty() {
                    return None;
                }
                let n = pts.len() as f64;
                let (sx, sy) = pts
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
                Some(Point::new(sx / n, sy / n, p.spatial_reference))
            }
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        match self {
            Geometry::Point(p) => Some(Extent::new(p.x, p.y, p.x, p.y, p.spatial_reference)),
            Geometry::Polyline(l) => Polygon::new(l.paths.clone(), l.spatial_reference).extent(),
            Geometry::Polygon(p) => p.extent(),
        }
    }
}

/// Distinct vertices in `ring`, counting no further than `limit`.
fn count_distinct(ring: &[[f64; 2]], limit: usize) -> usize {
    let mut seen: Vec<[f64; 2]> = Vec::with_capacity(limit);
    for p in ring {
        if !seen.contains(p) {
            seen.push(*p);
            if seen.len() == limit {
                break;
            }
        }
    }
    seen.len()
}

fn ring_crossings_odd(ring: &[[f64; 2]], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
