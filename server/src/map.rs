//! Arena geometry: world borders, wall outlines and spawnable areas.
//!
//! Spawn points are drawn uniformly by area: every spawn polygon is triangulated, a triangle
//! is picked with probability proportional to its area and a point is sampled inside it.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::math::{clamp, Vec2};
use shared::protocol::Polygon;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_WIDTH: f32 = 1920.0;
pub const DEFAULT_HEIGHT: f32 = 1080.0;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid map json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wall {index} has {count} vertices, at least 3 are required")]
    DegenerateWall { index: usize, count: usize },
}

/// On-disk map format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDefinition {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub walls: Vec<Polygon>,
    #[serde(default)]
    pub spawn_areas: Vec<Polygon>,
}

/// World bounds, centred on the origin. `top` is the smaller y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Borders {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

pub type Triangle = [Vec2; 3];

#[derive(Debug, Clone)]
pub struct Map {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub walls: Vec<Polygon>,
    spawn_areas: Vec<Polygon>,
    borders: Borders,
    triangles: Vec<Triangle>,
    /// Running sum of triangle areas; `cumulative_areas[i]` covers triangles `0..=i`.
    cumulative_areas: Vec<f32>,
    total_area: f32,
}

impl Map {
    pub fn from_definition(name: &str, definition: MapDefinition) -> Result<Self, MapError> {
        if let Some((index, wall)) = definition
            .walls
            .iter()
            .enumerate()
            .find(|(_, w)| w.len() < 3)
        {
            return Err(MapError::DegenerateWall {
                index,
                count: wall.len(),
            });
        }

        Ok(Self::build(name, definition))
    }

    fn build(name: &str, definition: MapDefinition) -> Self {
        let width = definition.width.filter(|w| *w > 0.0).unwrap_or(DEFAULT_WIDTH);
        let height = definition.height.filter(|h| *h > 0.0).unwrap_or(DEFAULT_HEIGHT);
        let spawn_areas = if definition.spawn_areas.is_empty() {
            vec![whole_map_area(width, height)]
        } else {
            definition.spawn_areas
        };

        let mut map = Map {
            name: name.to_string(),
            width,
            height,
            walls: definition.walls,
            spawn_areas,
            borders: Borders {
                left: -width / 2.0,
                right: width / 2.0,
                top: -height / 2.0,
                bottom: height / 2.0,
            },
            triangles: Vec::new(),
            cumulative_areas: Vec::new(),
            total_area: 0.0,
        };
        map.build_spawn_index();
        map
    }

    /// Reads `<dir>/<name>.json`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, MapError> {
        let path = dir.join(format!("{}.json", name));
        info!("Looking for map in {}", path.display());
        let contents = fs::read_to_string(&path).map_err(|source| MapError::Io {
            path: path.clone(),
            source,
        })?;
        let definition: MapDefinition = serde_json::from_str(&contents)?;
        Self::from_definition(name, definition)
    }

    /// Default-sized map with the given walls and the whole area spawnable.
    pub fn fallback(walls: Vec<Polygon>) -> Self {
        let definition = MapDefinition {
            width: Some(DEFAULT_WIDTH),
            height: Some(DEFAULT_HEIGHT),
            walls: walls.into_iter().filter(|w| w.len() >= 3).collect(),
            spawn_areas: Vec::new(),
        };
        Self::build("default", definition)
    }

    fn build_spawn_index(&mut self) {
        self.triangles.clear();
        for area in &self.spawn_areas {
            let points: Vec<Vec2> = area.iter().map(|p| Vec2::new(p[0], p[1])).collect();
            self.triangles.extend(triangulate(&points));
        }

        self.cumulative_areas.clear();
        let mut running = 0.0;
        for triangle in &self.triangles {
            running += triangle_area(triangle).abs();
            self.cumulative_areas.push(running);
        }
        self.total_area = running;
        debug!(
            "Map '{}': {} spawn triangles, {:.0} spawnable area",
            self.name,
            self.triangles.len(),
            self.total_area
        );
    }

    pub fn borders(&self) -> Borders {
        self.borders
    }

    pub fn spawn_areas(&self) -> &[Polygon] {
        &self.spawn_areas
    }

    pub fn spawn_triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn spawnable_area(&self) -> f32 {
        self.total_area
    }

    /// Whether the point lies inside the map shrunk by `shrink` on every side.
    pub fn is_within_borders(&self, x: f32, y: f32, shrink: f32) -> bool {
        let b = &self.borders;
        x >= b.left + shrink && x <= b.right - shrink && y >= b.top + shrink && y <= b.bottom - shrink
    }

    /// Clamps the point into the map shrunk by `shrink` on every side.
    pub fn contain_within_borders(&self, x: f32, y: f32, shrink: f32) -> (f32, f32) {
        let b = &self.borders;
        (
            clamp(x, b.left + shrink, b.right - shrink),
            clamp(y, b.top + shrink, b.bottom - shrink),
        )
    }

    /// Area-weighted uniform point from the spawn areas. The map centre when nothing is
    /// spawnable.
    pub fn random_spawn_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let Some(last) = self.triangles.len().checked_sub(1) else {
            return Vec2::ZERO;
        };
        let r = self.total_area * rng.gen::<f32>();
        let index = self
            .cumulative_areas
            .iter()
            .position(|&cumulative| cumulative > r)
            .unwrap_or(last);
        random_point_in_triangle(&self.triangles[index], rng.gen(), rng.gen())
    }
}

fn whole_map_area(width: f32, height: f32) -> Polygon {
    vec![
        [-width / 2.0, height / 2.0],
        [width / 2.0, height / 2.0],
        [width / 2.0, -height / 2.0],
        [-width / 2.0, -height / 2.0],
    ]
}

/// Signed area (shoelace); positive for counter-clockwise in a y-up frame.
pub fn triangle_area(triangle: &Triangle) -> f32 {
    let [a, b, c] = *triangle;
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

/// Maps two uniform samples in `[0, 1)` to a uniform point inside the triangle. Pairs that
/// land in the far half of the parallelogram are reflected back.
pub fn random_point_in_triangle(triangle: &Triangle, t1: f32, t2: f32) -> Vec2 {
    let [a, b, c] = *triangle;
    let (t1, t2) = if t1 + t2 > 1.0 {
        (1.0 - t1, 1.0 - t2)
    } else {
        (t1, t2)
    };
    Vec2::new(
        (b.x - a.x) * t1 + (c.x - a.x) * t2 + a.x,
        (b.y - a.y) * t1 + (c.y - a.y) * t2 + a.y,
    )
}

fn signed_polygon_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Ear-clipping triangulation of a simple polygon (either winding).
///
/// Falls back to a fan over the remaining vertices if the outline is self-intersecting and
/// no ear can be found.
pub fn triangulate(points: &[Vec2]) -> Vec<Triangle> {
    if points.len() < 3 {
        return Vec::new();
    }
    if points.len() == 3 {
        return vec![[points[0], points[1], points[2]]];
    }

    let mut indices: Vec<usize> = (0..points.len()).collect();
    if signed_polygon_area(points) < 0.0 {
        indices.reverse();
    }

    let mut triangles = Vec::with_capacity(points.len() - 2);
    while indices.len() > 3 {
        let n = indices.len();
        let ear = (0..n).find(|&i| {
            let a = points[indices[(i + n - 1) % n]];
            let b = points[indices[i]];
            let c = points[indices[(i + 1) % n]];
            if (b - a).perp_dot(c - b) <= 0.0 {
                return false;
            }
            indices.iter().enumerate().all(|(j, &k)| {
                j == i || j == (i + n - 1) % n || j == (i + 1) % n || !point_in_triangle(points[k], a, b, c)
            })
        });

        match ear {
            Some(i) => {
                triangles.push([
                    points[indices[(i + n - 1) % n]],
                    points[indices[i]],
                    points[indices[(i + 1) % n]],
                ]);
                indices.remove(i);
            }
            None => {
                debug!("No ear found in polygon of {} vertices, fanning the rest", n);
                for i in 1..n - 1 {
                    triangles.push([
                        points[indices[0]],
                        points[indices[i]],
                        points[indices[i + 1]],
                    ]);
                }
                return triangles;
            }
        }
    }
    if indices.len() == 3 {
        triangles.push([points[indices[0]], points[indices[1]], points[indices[2]]]);
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn total_area(triangles: &[Triangle]) -> f32 {
        triangles.iter().map(|t| triangle_area(t).abs()).sum()
    }

    #[test]
    fn test_default_dimensions_and_borders() {
        let map = Map::from_definition("empty", MapDefinition::default()).unwrap();
        assert_eq!(map.width, DEFAULT_WIDTH);
        assert_eq!(map.height, DEFAULT_HEIGHT);

        let b = map.borders();
        assert_eq!(b.left, -960.0);
        assert_eq!(b.right, 960.0);
        assert_eq!(b.top, -540.0);
        assert_eq!(b.bottom, 540.0);

        // Whole map is spawnable when no spawn areas are given.
        assert_eq!(map.spawn_areas().len(), 1);
        assert_approx_eq!(map.spawnable_area(), 1920.0 * 1080.0, 1.0);
    }

    #[test]
    fn test_borders_checks() {
        let map = Map::from_definition("m", MapDefinition::default()).unwrap();
        assert!(map.is_within_borders(0.0, 0.0, 0.0));
        assert!(map.is_within_borders(960.0, 540.0, 0.0));
        assert!(!map.is_within_borders(960.0, 0.0, 24.0));
        assert!(!map.is_within_borders(-961.0, 0.0, 0.0));

        assert_eq!(map.contain_within_borders(2000.0, -2000.0, 24.0), (936.0, -516.0));
        assert_eq!(map.contain_within_borders(10.0, 20.0, 24.0), (10.0, 20.0));
    }

    #[test]
    fn test_triangulate_concave_polygon_preserves_area() {
        // L-shape, area 3.
        let l_shape: Vec<Vec2> = [[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]]
            .iter()
            .map(|p| Vec2::new(p[0], p[1]))
            .collect();
        let triangles = triangulate(&l_shape);
        assert_eq!(triangles.len(), 4);
        assert_approx_eq!(total_area(&triangles), 3.0);

        // Same outline, clockwise.
        let mut reversed = l_shape.clone();
        reversed.reverse();
        let triangles = triangulate(&reversed);
        assert_eq!(triangles.len(), 4);
        assert_approx_eq!(total_area(&triangles), 3.0);
    }

    #[test]
    fn test_triangulate_degenerate_inputs() {
        assert!(triangulate(&[Vec2::ZERO, Vec2::new(1.0, 0.0)]).is_empty());
        assert_eq!(
            triangulate(&[Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]).len(),
            1
        );
    }

    #[test]
    fn test_point_in_triangle_reflection() {
        let triangle = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)];
        let p = random_point_in_triangle(&triangle, 0.2, 0.3);
        assert_approx_eq!(p.x, 2.0);
        assert_approx_eq!(p.y, 3.0);

        // t1 + t2 > 1 is reflected to (0.1, 0.2).
        let p = random_point_in_triangle(&triangle, 0.9, 0.8);
        assert_approx_eq!(p.x, 1.0);
        assert_approx_eq!(p.y, 2.0);
    }

    #[test]
    fn test_spawn_points_fall_inside_spawn_areas() {
        let definition = MapDefinition {
            width: Some(1000.0),
            height: Some(1000.0),
            walls: vec![],
            spawn_areas: vec![
                vec![[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]],
                vec![[-300.0, -300.0], [-200.0, -300.0], [-200.0, -200.0]],
            ],
        };
        let map = Map::from_definition("areas", definition).unwrap();
        assert_approx_eq!(map.spawnable_area(), 10_000.0 + 5_000.0, 0.5);

        let mut rng = StdRng::seed_from_u64(7);
        let mut in_square = 0;
        for _ in 0..3000 {
            let p = map.random_spawn_point(&mut rng);
            let square = (-1e-3..=100.001).contains(&p.x) && (-1e-3..=100.001).contains(&p.y);
            let tri = p.y >= -300.001 && p.x <= -199.999 && p.y <= p.x + 1e-3;
            assert!(square || tri, "spawn point {:?} outside spawn areas", p);
            if square {
                in_square += 1;
            }
        }
        // Weighted by area: roughly two thirds of the points land in the square.
        assert!((1800..2200).contains(&in_square), "got {}", in_square);
    }

    #[test]
    fn test_degenerate_wall_is_rejected() {
        let definition = MapDefinition {
            walls: vec![vec![[0.0, 0.0], [1.0, 1.0]]],
            ..MapDefinition::default()
        };
        match Map::from_definition("bad", definition) {
            Err(MapError::DegenerateWall { index, count }) => {
                assert_eq!(index, 0);
                assert_eq!(count, 2);
            }
            other => panic!("expected degenerate wall error, got {:?}", other.map(|m| m.name)),
        }
    }

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{"width": 800, "walls": [[[0,0],[10,0],[10,10]]], "spawnAreas": []}"#;
        let definition: MapDefinition = serde_json::from_str(json).unwrap();
        let map = Map::from_definition("json", definition).unwrap();
        assert_eq!(map.width, 800.0);
        assert_eq!(map.height, DEFAULT_HEIGHT);
        assert_eq!(map.walls.len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Map::load(Path::new("/definitely/not/here"), "nope");
        assert!(matches!(result, Err(MapError::Io { .. })));
    }

    #[test]
    fn test_fallback_map() {
        let map = Map::fallback(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], vec![[5.0, 5.0]]]);
        assert_eq!(map.name, "default");
        assert_eq!(map.walls.len(), 1);
        let mut rng = StdRng::seed_from_u64(1);
        let p = map.random_spawn_point(&mut rng);
        assert!(map.is_within_borders(p.x, p.y, 0.0));
    }
}
