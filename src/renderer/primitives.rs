use super::vertex::{v, Vertex};

/// Unit cube centred on the origin, 24 vertices so every face has its own normal.
/// Triangles wind counter-clockwise seen from outside.
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let p = |x, y, z| [x, y, z];

    let verts = vec![
        // Right face (+X)
        v(p(0.5, -0.5, -0.5), [1.0, 0.0, 0.0], [0.0, 1.0]),
        v(p(0.5, 0.5, -0.5), [1.0, 0.0, 0.0], [0.0, 0.0]),
        v(p(0.5, 0.5, 0.5), [1.0, 0.0, 0.0], [1.0, 0.0]),
        v(p(0.5, -0.5, 0.5), [1.0, 0.0, 0.0], [1.0, 1.0]),
        // Left face (-X)
        v(p(-0.5, -0.5, 0.5), [-1.0, 0.0, 0.0], [0.0, 1.0]),
        v(p(-0.5, 0.5, 0.5), [-1.0, 0.0, 0.0], [0.0, 0.0]),
        v(p(-0.5, 0.5, -0.5), [-1.0, 0.0, 0.0], [1.0, 0.0]),
        v(p(-0.5, -0.5, -0.5), [-1.0, 0.0, 0.0], [1.0, 1.0]),
        // Top face (+Y)
        v(p(-0.5, 0.5, -0.5), [0.0, 1.0, 0.0], [0.0, 1.0]),
        v(p(-0.5, 0.5, 0.5), [0.0, 1.0, 0.0], [0.0, 0.0]),
        v(p(0.5, 0.5, 0.5), [0.0, 1.0, 0.0], [1.0, 0.0]),
        v(p(0.5, 0.5, -0.5), [0.0, 1.0, 0.0], [1.0, 1.0]),
        // Bottom face (-Y)
        v(p(-0.5, -0.5, 0.5), [0.0, -1.0, 0.0], [0.0, 1.0]),
        v(p(-0.5, -0.5, -0.5), [0.0, -1.0, 0.0], [0.0, 0.0]),
        v(p(0.5, -0.5, -0.5), [0.0, -1.0, 0.0], [1.0, 0.0]),
        v(p(0.5, -0.5, 0.5), [0.0, -1.0, 0.0], [1.0, 1.0]),
        // Front face (+Z)
        v(p(0.5, -0.5, 0.5), [0.0, 0.0, 1.0], [0.0, 1.0]),
        v(p(0.5, 0.5, 0.5), [0.0, 0.0, 1.0], [0.0, 0.0]),
        v(p(-0.5, 0.5, 0.5), [0.0, 0.0, 1.0], [1.0, 0.0]),
        v(p(-0.5, -0.5, 0.5), [0.0, 0.0, 1.0], [1.0, 1.0]),
        // Back face (-Z)
        v(p(-0.5, -0.5, -0.5), [0.0, 0.0, -1.0], [0.0, 1.0]),
        v(p(-0.5, 0.5, -0.5), [0.0, 0.0, -1.0], [0.0, 0.0]),
        v(p(0.5, 0.5, -0.5), [0.0, 0.0, -1.0], [1.0, 0.0]),
        v(p(0.5, -0.5, -0.5), [0.0, 0.0, -1.0], [1.0, 1.0]),
    ];

    let idx = (0..6)
        .flat_map(|f| {
            let o = f * 4;
            [o, o + 1, o + 2, o, o + 2, o + 3]
        })
        .map(|i| i as u32)
        .collect::<Vec<_>>();

    (verts, idx)
}

/// Square in the XZ plane facing +Y, `size` units wide.
pub fn plane(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let n = [0.0, 1.0, 0.0];
    let verts = vec![
        v([-h, 0.0, -h], n, [0.0, 0.0]),
        v([-h, 0.0, h], n, [0.0, 1.0]),
        v([h, 0.0, h], n, [1.0, 1.0]),
        v([h, 0.0, -h], n, [1.0, 0.0]),
    ];
    (verts, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn assert_outward_ccw(vertices: &[Vertex], indices: &[u32]) {
        for tri in indices.chunks(3) {
            let a = Vec3::from(vertices[tri[0] as usize].pos);
            let b = Vec3::from(vertices[tri[1] as usize].pos);
            let c = Vec3::from(vertices[tri[2] as usize].pos);
            let face_normal = (b - a).cross(c - a);
            let normal = Vec3::from(vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(normal) > 0.0, "triangle {tri:?} winds inward");
        }
    }

    #[test]
    fn cube_counts_look_right() {
        let (v, i) = cube();
        assert_eq!(v.len(), 24);
        assert_eq!(i.len(), 36);
    }

    #[test]
    fn cube_and_plane_wind_counter_clockwise_from_outside() {
        let (v, i) = cube();
        assert_outward_ccw(&v, &i);
        let (v, i) = plane(4.0);
        assert_outward_ccw(&v, &i);
    }
}
