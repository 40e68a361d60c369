use glam::DVec3;

use crate::error::{CarveError, Result};
use crate::spatial::bvh::{BoundsProvider, QueryRegion};
use crate::types::{Aabb, Triangle};

/// Spherical query region.
///
/// Accepts items whose box centre lies within `radius` of `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereRegion {
    center: DVec3,
    radius: f64,
    radius_squared: f64,
    bounds: Aabb,
}

impl SphereRegion {
    /// Create a region. A negative radius is clamped to zero.
    pub fn new(center: DVec3, radius: f64) -> Self {
        let radius = radius.max(0.0);
        Self {
            center,
            radius,
            radius_squared: radius * radius,
            bounds: sphere_bounds(center, radius),
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Box enclosing the sphere.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn set_center(&mut self, center: DVec3) {
        self.center = center;
        self.bounds = sphere_bounds(center, self.radius);
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<()> {
        if radius.is_nan() || radius < 0.0 {
            return Err(CarveError::Input(format!(
                "sphere radius must be non-negative, got {radius}"
            )));
        }
        self.radius = radius;
        self.radius_squared = radius * radius;
        self.bounds = sphere_bounds(self.center, radius);
        Ok(())
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.distance_squared(self.center) <= self.radius_squared
    }

    /// Whether the sphere reaches into `aabb`.
    pub fn touches(&self, aabb: &Aabb) -> bool {
        aabb.outer_distance_squared(self.center) <= self.radius_squared
    }
}

impl<T: BoundsProvider> QueryRegion<T> for SphereRegion {
    fn intersects(&self, aabb: &Aabb) -> bool {
        self.touches(aabb)
    }

    fn contains(&self, item: &T) -> bool {
        self.contains_point(item.bounds().center())
    }
}

/// Sphere that accepts a triangle when any point of it lies inside.
///
/// Used by the nearest-triangle search: the first non-empty result set is
/// guaranteed to contain the triangle nearest to the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSphere(pub SphereRegion);

impl SurfaceSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self(SphereRegion::new(center, radius))
    }
}

impl QueryRegion<Triangle> for SurfaceSphere {
    fn intersects(&self, aabb: &Aabb) -> bool {
        self.0.touches(aabb)
    }

    fn contains(&self, item: &Triangle) -> bool {
        item.closest_squared_distance(self.0.center) <= self.0.radius_squared
    }
}

fn sphere_bounds(center: DVec3, radius: f64) -> Aabb {
    Aabb::new(center - DVec3::splat(radius), center + DVec3::splat(radius))
}
