//! Narrow-phase collision world: circle and polygon bodies with overlap queries.
//!
//! The world answers two questions and nothing more: which bodies are near a given body
//! ([`CollisionWorld::potentials`], an AABB broad phase refreshed by
//! [`CollisionWorld::update`]) and whether two bodies overlap, and along which axis
//! ([`CollisionWorld::collides`], a parry contact query). Responding to a collision is left
//! to the owning entity.
//!
//! Polygon outlines are wrapped in their convex hull.

use parry2d::bounding_volume::{Aabb, BoundingVolume};
use parry2d::math::{Isometry, Point, Real};
use parry2d::query;
use parry2d::shape::{Shape, SharedShape};
use shared::math::Vec2;
use shared::EntityId;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    pub struct BodyHandle;
}

/// Outcome of a positive overlap test between bodies `a` and `b`.
///
/// `(overlap_x, overlap_y)` is a unit vector pointing from `a` towards `b`; moving `a` by
/// `-overlap * (overlap_x, overlap_y)` separates the two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub overlap: f32,
    pub overlap_x: f32,
    pub overlap_y: f32,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub owner: EntityId,
    pub active: bool,
    shape: SharedShape,
    position: Vec2,
    ignore: Vec<EntityId>,
    aabb: Aabb,
}

impl Body {
    fn new(owner: EntityId, shape: SharedShape, x: f32, y: f32) -> Self {
        let position = Vec2::new(x, y);
        let aabb = shape.compute_aabb(&isometry(position));
        Self {
            owner,
            active: true,
            shape,
            position,
            ignore: Vec::new(),
            aabb,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Whether collisions with bodies owned by `entity` are ignored.
    pub fn ignores(&self, entity: EntityId) -> bool {
        self.ignore.contains(&entity)
    }
}

fn isometry(position: Vec2) -> Isometry<Real> {
    Isometry::translation(position.x, position.y)
}

/// Convex hull of the outline. Outlines without area degrade to a polyline.
fn polygon_shape(points: &[[f32; 2]]) -> SharedShape {
    let points: Vec<Point<Real>> = points.iter().map(|p| Point::new(p[0], p[1])).collect();
    SharedShape::convex_hull(&points).unwrap_or_else(|| SharedShape::polyline(points, None))
}

#[derive(Debug, Default)]
pub struct CollisionWorld {
    bodies: SlotMap<BodyHandle, Body>,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_circle(&mut self, owner: EntityId, x: f32, y: f32, radius: f32) -> BodyHandle {
        self.bodies
            .insert(Body::new(owner, SharedShape::ball(radius), x, y))
    }

    /// `points` are relative to `(x, y)`.
    pub fn create_polygon(&mut self, owner: EntityId, x: f32, y: f32, points: &[[f32; 2]]) -> BodyHandle {
        self.bodies.insert(Body::new(owner, polygon_shape(points), x, y))
    }

    /// Detaches a body. Removing an unknown handle is a no-op.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        self.bodies.remove(handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn set_position(&mut self, handle: BodyHandle, x: f32, y: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.position = Vec2::new(x, y);
        }
    }

    pub fn set_active(&mut self, handle: BodyHandle, active: bool) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.active = active;
        }
    }

    pub fn is_active(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some_and(|b| b.active)
    }

    pub fn add_ignore(&mut self, handle: BodyHandle, entity: EntityId) {
        if let Some(body) = self.bodies.get_mut(handle) {
            if !body.ignore.contains(&entity) {
                body.ignore.push(entity);
            }
        }
    }

    /// Refreshes broad-phase bounds from current body positions.
    pub fn update(&mut self) {
        for body in self.bodies.values_mut() {
            body.aabb = body.shape.compute_aabb(&isometry(body.position));
        }
    }

    /// Bodies whose bounds overlapped `handle`'s at the last [`update`](Self::update),
    /// inactive ones included.
    pub fn potentials(&self, handle: BodyHandle) -> Vec<BodyHandle> {
        let Some(body) = self.body(handle) else {
            return Vec::new();
        };
        self.bodies
            .iter()
            .filter(|(other, o)| *other != handle && o.aabb.intersects(&body.aabb))
            .map(|(other, _)| other)
            .collect()
    }

    /// Exact overlap test at the bodies' current positions. Touching is not overlapping.
    pub fn collides(&self, a: BodyHandle, b: BodyHandle) -> Option<CollisionResult> {
        let a = self.body(a)?;
        let b = self.body(b)?;
        let contact = query::contact(
            &isometry(a.position),
            a.shape.as_ref(),
            &isometry(b.position),
            b.shape.as_ref(),
            0.0,
        )
        .ok()??;
        if contact.dist >= 0.0 {
            return None;
        }
        Some(CollisionResult {
            overlap: -contact.dist,
            overlap_x: contact.normal1.x,
            overlap_y: contact.normal1.y,
        })
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
