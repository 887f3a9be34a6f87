//! Ray-traceable primitive records and a CPU reference tracer.
//!
//! `Sphere` and `Aabb` are uploaded verbatim as primitive data and bounding
//! boxes. The tracer below follows the same camera, traversal and
//! intersection rules as the `kern`/`inte` shader pair, so test code can
//! predict what a build of these records yields.

use bytemuck::{Pod, Zeroable};

use crate::coords::Vec3;

/// Eye position of the primary rays.
pub const CAMERA_ORIGIN: Vec3 = Vec3::new(0.0, 0.0, -3.0);

/// Distance from the eye to the image plane spanning NDC [-1, 1].
pub const FOCAL_LENGTH: f32 = 1.4;

pub const MIN_DISTANCE: f32 = 1.0e-3;
pub const MAX_DISTANCE: f32 = 1.0e4;

/// Primitive data for the sphere intersection function.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub padding: f32,
}

impl Sphere {
    /// The scene's only primitive.
    pub const UNIT: Sphere = Sphere {
        center: Vec3::zero(),
        radius: 1.0,
        padding: 0.0,
    };

    pub fn bounds(&self) -> Aabb {
        let r = Vec3::splat(self.radius);
        Aabb {
            min: self.center - r,
            max: self.center + r,
        }
    }

    /// Nearest entry distance within `[min_distance, max_distance]`.
    ///
    /// Only the near root is considered; a ray starting inside the sphere
    /// reports no hit.
    pub fn intersect(&self, ray: &Ray, min_distance: f32, max_distance: f32) -> Option<f32> {
        let oc = ray.origin - self.center;
        let a = ray.direction.dot(ray.direction);
        let b = 2.0 * oc.dot(ray.direction);
        let c = oc.dot(oc) - self.radius * self.radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let distance = (-b - discriminant.sqrt()) / (2.0 * a);
        (distance >= min_distance && distance <= max_distance).then_some(distance)
    }

    /// Outward unit normal at a surface point.
    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        ((point - self.center) / self.radius).normalize()
    }
}

/// Axis-aligned bounding box record.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Slab test. Returns the `(entry, exit)` distances when the ray's line
    /// crosses the box and the exit lies ahead of `MIN_DISTANCE`.
    pub fn slab(&self, ray: &Ray) -> Option<(f32, f32)> {
        let inv = ray.direction.recip();
        let t0 = (self.min - ray.origin).mul_elem(inv);
        let t1 = (self.max - ray.origin).mul_elem(inv);

        let entry = t0.min(t1).max_element();
        let exit = t0.max(t1).min_element();
        (entry <= exit && exit >= MIN_DISTANCE).then_some((entry, exit))
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray from the camera through the center of pixel `(x, y)` of a
    /// `width` × `height` image; +Y of the image points down.
    pub fn primary(x: u32, y: u32, width: u32, height: u32) -> Ray {
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        let ndc_x = u * 2.0 - 1.0;
        let ndc_y = v * 2.0 - 1.0;

        Ray {
            origin: CAMERA_ORIGIN,
            direction: Vec3::new(ndc_x, -ndc_y, FOCAL_LENGTH).normalize(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hit {
    pub primitive: u32,
    pub distance: f32,
}

/// Closest accepted sphere hit over bounding boxes paired with spheres.
///
/// Box `i` bounds `spheres[i]`; a box the ray misses never calls into the
/// sphere test.
pub fn closest_hit(ray: &Ray, boxes: &[Aabb], spheres: &[Sphere]) -> Option<Hit> {
    let mut closest: Option<Hit> = None;

    for (primitive, (bounds, sphere)) in boxes.iter().zip(spheres).enumerate() {
        if bounds.slab(ray).is_none() {
            continue;
        }

        let max_distance = closest.map_or(MAX_DISTANCE, |h| h.distance);
        if let Some(distance) = sphere.intersect(ray, MIN_DISTANCE, max_distance) {
            closest = Some(Hit {
                primitive: primitive as u32,
                distance,
            });
        }
    }

    closest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> (Vec<Aabb>, Vec<Sphere>) {
        (vec![Sphere::UNIT.bounds()], vec![Sphere::UNIT])
    }

    // ── records ───────────────────────────────────────────────────────────

    #[test]
    fn record_layouts_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<Sphere>(), 20);
        assert_eq!(std::mem::size_of::<Aabb>(), 24);
    }

    #[test]
    fn unit_sphere_bounds_span_minus_one_to_one() {
        let b = Sphere::UNIT.bounds();
        assert_eq!(b.min, Vec3::splat(-1.0));
        assert_eq!(b.max, Vec3::splat(1.0));
    }

    // ── sphere ────────────────────────────────────────────────────────────

    #[test]
    fn axis_ray_hits_front_of_sphere() {
        let ray = Ray {
            origin: CAMERA_ORIGIN,
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        let d = Sphere::UNIT.intersect(&ray, MIN_DISTANCE, MAX_DISTANCE).unwrap();
        assert!((d - 2.0).abs() < 1e-5);
        assert!((Sphere::UNIT.normal_at(ray.at(d)) - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn hit_beyond_max_distance_is_rejected() {
        let ray = Ray {
            origin: CAMERA_ORIGIN,
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        assert_eq!(Sphere::UNIT.intersect(&ray, MIN_DISTANCE, 1.5), None);
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray {
            origin: CAMERA_ORIGIN,
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert_eq!(Sphere::UNIT.intersect(&ray, MIN_DISTANCE, MAX_DISTANCE), None);
    }

    // ── bounding box ──────────────────────────────────────────────────────

    #[test]
    fn slab_reports_entry_and_exit() {
        let ray = Ray {
            origin: Vec3::new(0.25, 0.25, -3.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        let (entry, exit) = Sphere::UNIT.bounds().slab(&ray).unwrap();
        assert!((entry - 2.0).abs() < 1e-6);
        assert!((exit - 4.0).abs() < 1e-6);
    }

    #[test]
    fn slab_misses_box_behind_origin() {
        let ray = Ray {
            origin: Vec3::new(0.25, 0.25, 3.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        assert_eq!(Sphere::UNIT.bounds().slab(&ray), None);
    }

    #[test]
    fn box_corner_region_passes_slab_but_misses_sphere() {
        let ray = Ray {
            origin: Vec3::new(0.9, 0.9, -3.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        assert!(Sphere::UNIT.bounds().slab(&ray).is_some());
        assert_eq!(Sphere::UNIT.intersect(&ray, MIN_DISTANCE, MAX_DISTANCE), None);
    }

    // ── primary rays ──────────────────────────────────────────────────────

    #[test]
    fn center_pixels_hit_and_corners_miss() {
        let (boxes, spheres) = scene();

        for (x, y) in [(3, 3), (4, 3), (3, 4), (4, 4)] {
            let hit = closest_hit(&Ray::primary(x, y, 8, 8), &boxes, &spheres).unwrap();
            assert_eq!(hit.primitive, 0);
            assert!(hit.distance > 1.9 && hit.distance < 2.2, "{hit:?}");
        }

        for (x, y) in [(0, 0), (7, 0), (0, 7), (7, 7)] {
            assert_eq!(closest_hit(&Ray::primary(x, y, 8, 8), &boxes, &spheres), None);
        }
    }

    #[test]
    fn no_pixel_center_grazes_the_silhouette() {
        let (boxes, spheres) = scene();
        let mut hits = 0;

        for y in 0..8 {
            for x in 0..8 {
                let ray = Ray::primary(x, y, 8, 8);
                // Distance from the sphere center to the ray's line.
                let along = (Sphere::UNIT.center - ray.origin).dot(ray.direction);
                let miss_distance = (ray.at(along) - Sphere::UNIT.center).length();
                assert!((miss_distance - 1.0).abs() > 0.05, "pixel ({x}, {y}): {miss_distance}");

                hits += closest_hit(&ray, &boxes, &spheres).is_some() as u32;
            }
        }

        assert_eq!(hits, 12);
    }

    #[test]
    fn primary_rays_are_symmetric() {
        let a = Ray::primary(1, 2, 8, 8).direction;
        let b = Ray::primary(6, 5, 8, 8).direction;
        assert!((a.x + b.x).abs() < 1e-6);
        assert!((a.y + b.y).abs() < 1e-6);
        assert!((a.z - b.z).abs() < 1e-6);
    }

    #[test]
    fn primary_rays_point_into_the_box() {
        let b = Sphere::UNIT.bounds();
        let ray = Ray::primary(4, 4, 8, 8);
        assert!(b.contains(ray.at(3.0)));
    }
}
