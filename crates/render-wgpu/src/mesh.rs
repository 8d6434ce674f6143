use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct CubeVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

const fn v(position: [f32; 3], uv: [f32; 2]) -> CubeVertex {
    CubeVertex { position, uv }
}

/// Unit cube centered on the origin, one UV square per face.
pub(crate) fn cube_mesh() -> (Vec<CubeVertex>, Vec<u16>) {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let vertices = vec![
        // +Z face
        v([-p, -p,  p], [0.0, 1.0]), v([ p, -p,  p], [1.0, 1.0]),
        v([ p,  p,  p], [1.0, 0.0]), v([-p,  p,  p], [0.0, 0.0]),
        // -Z face
        v([ p, -p, -p], [0.0, 1.0]), v([-p, -p, -p], [1.0, 1.0]),
        v([-p,  p, -p], [1.0, 0.0]), v([ p,  p, -p], [0.0, 0.0]),
        // +X face
        v([ p, -p,  p], [0.0, 1.0]), v([ p, -p, -p], [1.0, 1.0]),
        v([ p,  p, -p], [1.0, 0.0]), v([ p,  p,  p], [0.0, 0.0]),
        // -X face
        v([-p, -p, -p], [0.0, 1.0]), v([-p, -p,  p], [1.0, 1.0]),
        v([-p,  p,  p], [1.0, 0.0]), v([-p,  p, -p], [0.0, 0.0]),
        // +Y face
        v([-p,  p,  p], [0.0, 1.0]), v([ p,  p,  p], [1.0, 1.0]),
        v([ p,  p, -p], [1.0, 0.0]), v([-p,  p, -p], [0.0, 0.0]),
        // -Y face
        v([-p, -p, -p], [0.0, 1.0]), v([ p, -p, -p], [1.0, 1.0]),
        v([ p, -p,  p], [1.0, 0.0]), v([-p, -p,  p], [0.0, 0.0]),
    ];
    #[rustfmt::skip]
    let indices: Vec<u16> = vec![
        0,1,2, 2,3,0,       // +Z
        4,5,6, 6,7,4,       // -Z
        8,9,10, 10,11,8,    // +X
        12,13,14, 14,15,12, // -X
        16,17,18, 18,19,16, // +Y
        20,21,22, 22,23,20, // -Y
    ];
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_quads() {
        let (verts, indices) = cube_mesh();
        assert_eq!(verts.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < verts.len()));
    }

    #[test]
    fn cube_fits_unit_cell() {
        let (verts, _) = cube_mesh();
        for vert in &verts {
            assert!(vert.position.iter().all(|c| c.abs() == 0.5));
            assert!(vert.uv.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
