use glam::{DVec3, Mat3, Vec3};

use crate::error::Result;
use crate::vertex_list::VertexList;

/// Volume, center of mass and inertia tensor of a closed triangulated
/// polyhedron with unit density. The inertia tensor is taken about the
/// center of mass.
#[derive(Clone, Copy, Debug)]
pub struct MassProperties {
    pub volume: f32,
    pub com: Vec3,
    pub inertia: Mat3,
}

/// Closed-form surface integral over the triangles (Green's theorem applied
/// per tetrahedron against the origin), after Mirtich, "Fast and Accurate
/// Computation of Polyhedral Mass Properties". Accumulates in f64; the mesh
/// must be closed with CCW outward winding for the signs to cancel.
pub fn mass_properties(vl: &VertexList) -> Result<MassProperties> {
    vl.expect_triangles(3, "mass_properties")?;

    let mut volume = 0.0_f64;
    let mut first = DVec3::ZERO;
    // Second moments about the origin: xx, yy, zz, xy, yz, zx.
    let mut xx = 0.0_f64;
    let mut yy = 0.0_f64;
    let mut zz = 0.0_f64;
    let mut xy = 0.0_f64;
    let mut yz = 0.0_f64;
    let mut zx = 0.0_f64;

    for [i, j, k] in vl.triangles() {
        let a = vl.pos(i).as_dvec3();
        let b = vl.pos(j).as_dvec3();
        let c = vl.pos(k).as_dvec3();
        // Six times the signed volume of the tetrahedron (0, a, b, c).
        let d6 = a.dot(b.cross(c));

        volume += d6 / 6.0;
        first += d6 / 24.0 * (a + b + c);

        xx += d6 / 60.0 * (a.x * a.x + b.x * b.x + c.x * c.x + a.x * b.x + b.x * c.x + c.x * a.x);
        yy += d6 / 60.0 * (a.y * a.y + b.y * b.y + c.y * c.y + a.y * b.y + b.y * c.y + c.y * a.y);
        zz += d6 / 60.0 * (a.z * a.z + b.z * b.z + c.z * c.z + a.z * b.z + b.z * c.z + c.z * a.z);
        xy += d6 / 120.0
            * (2.0 * (a.x * a.y + b.x * b.y + c.x * c.y)
                + a.x * b.y + a.y * b.x
                + b.x * c.y + b.y * c.x
                + c.x * a.y + c.y * a.x);
        yz += d6 / 120.0
            * (2.0 * (a.y * a.z + b.y * b.z + c.y * c.z)
                + a.y * b.z + a.z * b.y
                + b.y * c.z + b.z * c.y
                + c.y * a.z + c.z * a.y);
        zx += d6 / 120.0
            * (2.0 * (a.z * a.x + b.z * b.x + c.z * c.x)
                + a.z * b.x + a.x * b.z
                + b.z * c.x + b.x * c.z
                + c.z * a.x + c.x * a.z);
    }

    let com = if volume.abs() > f64::EPSILON { first / volume } else { DVec3::ZERO };

    // Inertia about the origin, then parallel-axis down to the COM.
    let mut ixx = yy + zz;
    let mut iyy = xx + zz;
    let mut izz = xx + yy;
    let mut ixy = -xy;
    let mut iyz = -yz;
    let mut izx = -zx;

    ixx -= volume * (com.y * com.y + com.z * com.z);
    iyy -= volume * (com.x * com.x + com.z * com.z);
    izz -= volume * (com.x * com.x + com.y * com.y);
    ixy += volume * com.x * com.y;
    iyz += volume * com.y * com.z;
    izx += volume * com.z * com.x;

    Ok(MassProperties {
        volume: volume as f32,
        com: com.as_vec3(),
        inertia: Mat3::from_cols(
            Vec3::new(ixx as f32, ixy as f32, izx as f32),
            Vec3::new(ixy as f32, iyy as f32, iyz as f32),
            Vec3::new(izx as f32, iyz as f32, izz as f32),
        ),
    })
}

/// Signed volume alone, for callers that do not need the full tensor.
pub(crate) fn volume(vl: &VertexList) -> Result<f32> {
    vl.expect_triangles(3, "volume")?;
    let mut v = 0.0_f64;
    for [i, j, k] in vl.triangles() {
        let a = vl.pos(i).as_dvec3();
        let b = vl.pos(j).as_dvec3();
        let c = vl.pos(k).as_dvec3();
        v += a.dot(b.cross(c)) / 6.0;
    }
    Ok(v as f32)
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use glam::Vec3;

    use crate::mass::mass_properties;
    use crate::primitives::cube;
    use crate::transform::Transform;

    #[test]
    fn cube_mass_properties() {
        let props = mass_properties(&cube(1.0, 1.0, 1.0).unwrap()).unwrap();
        check!((props.volume - 8.0).abs() < 1e-5);
        check!(props.com.length() < 1e-6);
        // Unit density box: I = m (b^2 + c^2) / 3 with half-extents 1.
        let expected = 8.0 * 2.0 / 3.0;
        for i in 0..3 {
            for j in 0..3 {
                let got = props.inertia.col(j)[i];
                if i == j {
                    check!((got - expected).abs() < 1e-4, "diagonal entry {:?}", i);
                } else {
                    check!(got.abs() < 1e-4, "off-diagonal ({:?},{:?})", i, j);
                }
            }
        }
    }

    #[test]
    fn anisotropic_cube() {
        let (hx, hy, hz) = (0.5_f32, 1.0, 2.0);
        let props = mass_properties(&cube(hx, hy, hz).unwrap()).unwrap();
        let m = 8.0 * hx * hy * hz;
        check!((props.volume - m).abs() < 1e-4);
        let expect = Vec3::new(
            m * (hy * hy + hz * hz) / 3.0,
            m * (hx * hx + hz * hz) / 3.0,
            m * (hx * hx + hy * hy) / 3.0,
        );
        check!((props.inertia.col(0).x - expect.x).abs() < 1e-3);
        check!((props.inertia.col(1).y - expect.y).abs() < 1e-3);
        check!((props.inertia.col(2).z - expect.z).abs() < 1e-3);
    }

    #[test]
    fn translation_moves_com_not_inertia() {
        let shifted = Transform::translation(Vec3::new(3.0, -2.0, 1.0))
            .apply_to_list(&cube(1.0, 1.0, 1.0).unwrap())
            .unwrap();
        let props = mass_properties(&shifted).unwrap();
        check!((props.volume - 8.0).abs() < 1e-4);
        check!((props.com - Vec3::new(3.0, -2.0, 1.0)).length() < 1e-4);
        // About the center of mass the tensor is translation-invariant.
        check!((props.inertia.col(0).x - 8.0 * 2.0 / 3.0).abs() < 1e-3);
    }
}
