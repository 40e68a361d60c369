use glam::DVec3;

/// Axis-aligned bounding box in 3-D.
///
/// The empty box has `min = +inf` and `max = -inf` on every axis. It is the
/// identity element for [`Aabb::merge`] and [`Aabb::include_point`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The invalid box: contains nothing, merges to the other operand.
    pub const EMPTY: Aabb = Aabb {
        min: DVec3::INFINITY,
        max: DVec3::NEG_INFINITY,
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing every point in `points`.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut bb, p| {
            bb.include_point(p);
            bb
        })
    }

    /// `min <= max` on every axis and both corners finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
            && self.min.z <= self.max.z
    }

    /// Centre point of the box.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths along each axis.
    pub fn extents(&self) -> DVec3 {
        self.max - self.min
    }

    /// Length of the space diagonal.
    pub fn diagonal(&self) -> f64 {
        self.extents().length()
    }

    /// Volume, zero for an invalid box.
    pub fn volume(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        let e = self.extents();
        e.x * e.y * e.z
    }

    /// Axis (0 = X, 1 = Y, 2 = Z) with the largest extent. Ties prefer the lower axis.
    pub fn longest_axis(&self) -> usize {
        let e = self.extents();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// Grow the box to include `p`.
    pub fn include_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Return the smallest box that contains both `self` and `other`.
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether a point lies inside (or on the boundary of) the box.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_valid() && self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Whether the two boxes overlap (touching counts).
    pub fn intersects(&self, other: &Aabb) -> bool {
        !(other.min.x > self.max.x
            || other.max.x < self.min.x
            || other.min.y > self.max.y
            || other.max.y < self.min.y
            || other.min.z > self.max.z
            || other.max.z < self.min.z)
    }

    /// Squared distance from `p` to the nearest point of the box, zero inside.
    pub fn outer_distance_squared(&self, p: DVec3) -> f64 {
        let below = (self.min - p).max(DVec3::ZERO);
        let above = (p - self.max).max(DVec3::ZERO);
        (below + above).length_squared()
    }

    /// Volume increase needed to also enclose `other`.
    pub fn enlargement(&self, other: &Aabb) -> f64 {
        self.merge(other).volume() - self.volume()
    }
}
