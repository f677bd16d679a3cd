// mesh.rs - 全景球网格 (经纬球, 从内部观看)

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

/// UV sphere with `height_segments` rings and `width_segments` slices.
///
/// Triangles wind counter-clockwise seen from inside, and U runs backwards
/// so the panorama is not mirrored for a viewer at the center.
pub fn build_sphere(radius: f32, width_segments: usize, height_segments: usize) -> SphereMesh {
    let lat = height_segments.max(2);
    let lon = width_segments.max(3);
    let mut vertices = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let theta = std::f32::consts::PI * (i as f32) / (lat as f32);
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=lon {
            let phi = 2.0 * std::f32::consts::PI * (j as f32) / (lon as f32);

            let x = radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            // 纹理 v=0 在图像顶部
            let u = 1.0 - (j as f32) / (lon as f32);
            let v = (i as f32) / (lat as f32);

            vertices.push(SphereVertex {
                position: [x, y, z],
                uv: [u, v],
            });
        }
    }

    for i in 0..lat {
        for j in 0..lon {
            let a = (i * (lon + 1) + j) as u32;
            let b = a + (lon + 1) as u32;

            indices.extend_from_slice(&[
                a, b, a + 1,
                b, b + 1, a + 1,
            ]);
        }
    }

    SphereMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn counts_follow_segments() {
        let mesh = build_sphere(0.1, 360, 64);
        assert_eq!(mesh.vertices.len(), 65 * 361);
        assert_eq!(mesh.indices.len(), 64 * 360 * 6);
        let max = *mesh.indices.iter().max().unwrap() as usize;
        assert!(max < mesh.vertices.len());
    }

    #[test]
    fn vertices_lie_on_radius() {
        let mesh = build_sphere(0.1, 16, 8);
        for v in &mesh.vertices {
            assert!((Vec3::from_array(v.position).length() - 0.1).abs() < 1e-5);
        }
    }

    #[test]
    fn faces_point_inwards() {
        let mesh = build_sphere(1.0, 16, 8);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
            let normal = (b - a).cross(c - a);
            if normal.length() < 1e-6 {
                continue; // 两极退化三角形
            }
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) < 0.0);
        }
    }
}
