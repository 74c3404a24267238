//! Vertex formats and CPU-side geometry for the scene's shapes.
//!
//! Three vertex formats cover everything the renderer draws:
//!
//! | Format          | Used by            | Layout                                      |
//! |-----------------|--------------------|---------------------------------------------|
//! | [`LitVertex`]   | opaque cubes       | position, uv, normal, tangent (44 bytes)    |
//! | [`ColorVertex`] | translucent quads  | position, packed RGBA8 color (16 bytes)     |
//! | [`SkyVertex`]   | the sky backdrop   | position (12 bytes)                         |
//!
//! Geometry is built on the CPU as a [`Geometry`] and uploaded by the drawable that
//! owns it. All primitives use counter-clockwise front faces.

use glam::Vec3;

use crate::device::VertexLayout;

/// Vertex of a lit, normal-mapped surface.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LitVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl LitVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LitVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 20,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x3,
            },
            // tangent
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    };

    pub fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3], tangent: [f32; 3]) -> Self {
        Self {
            position,
            uv,
            normal,
            tangent,
        }
    }
}

/// Vertex of a flat-colored translucent surface.
///
/// The color is packed as `0xAABBGGRR`, so red is the lowest byte.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: u32,
}

impl ColorVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ColorVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Unorm8x4,
            },
        ],
    };
}

/// Position-only vertex of the sky sphere.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyVertex {
    pub position: [f32; 3],
}

impl SkyVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SkyVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    };
}

impl VertexLayout {
    /// The wgpu buffer layout of this vertex format.
    pub fn buffer_layout(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            VertexLayout::Lit => LitVertex::LAYOUT,
            VertexLayout::Colored => ColorVertex::LAYOUT,
            VertexLayout::Position => SkyVertex::LAYOUT,
        }
    }

    /// Bytes per vertex.
    pub fn stride(self) -> u64 {
        self.buffer_layout().array_stride
    }
}

/// An RGBA color with 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const RED: Rgba8 = Rgba8::new(255, 0, 0, 128);
    pub const BLUE: Rgba8 = Rgba8::new(0, 0, 255, 128);

    /// Packs into `0xAABBGGRR`.
    pub fn packed(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }
}

/// CPU-side vertex and index data for one shape.
#[derive(Clone, Debug)]
pub struct Geometry<V> {
    pub vertices: Vec<V>,
    pub indices: Vec<u32>,
}

impl<V: bytemuck::Pod> Geometry<V> {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// A unit cube centered at the origin, four vertices per face for flat normals.
pub fn cube() -> Geometry<LitVertex> {
    // (normal, tangent) per face: front, back, top, bottom, right, left
    let faces: [([f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, tangent) in faces {
        let n = Vec3::from(normal);
        let t = Vec3::from(tangent);
        let b = n.cross(t);
        let base = vertices.len() as u32;

        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let p = n * 0.5 + t * (u - 0.5) + b * (v - 0.5);
            vertices.push(LitVertex::new(p.to_array(), [u, 1.0 - v], normal, tangent));
        }

        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    Geometry { vertices, indices }
}

/// A unit quad in the YZ plane (x = 0), facing +X, filled with `color`.
pub fn rect(color: Rgba8) -> Geometry<ColorVertex> {
    let color = color.packed();
    #[rustfmt::skip]
    let vertices = vec![
        ColorVertex { position: [0.0, -0.5,  0.5], color },
        ColorVertex { position: [0.0, -0.5, -0.5], color },
        ColorVertex { position: [0.0,  0.5, -0.5], color },
        ColorVertex { position: [0.0,  0.5,  0.5], color },
    ];
    let indices = vec![0, 1, 2, 2, 3, 0];

    Geometry { vertices, indices }
}

/// A UV sphere of radius 1 centered at the origin.
pub fn sphere(segments: u32, rings: u32) -> Geometry<SkyVertex> {
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for seg in 0..=segments {
            let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
            vertices.push(SkyVertex {
                position: [ring_radius * theta.cos(), y, ring_radius * theta.sin()],
            });
        }
    }

    for ring in 0..rings {
        for seg in 0..segments {
            let current = ring * (segments + 1) + seg;
            let next = current + segments + 1;

            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    Geometry { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_strides_match_layouts() {
        assert_eq!(VertexLayout::Lit.stride(), 44);
        assert_eq!(VertexLayout::Colored.stride(), 16);
        assert_eq!(VertexLayout::Position.stride(), 12);
    }

    #[test]
    fn cube_faces_point_outward() {
        let cube = cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);

        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(cube.vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a).normalize();
            let normal = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(normal) > 0.99, "triangle {tri:?} winds inward");
        }
    }

    #[test]
    fn rect_faces_positive_x() {
        let quad = rect(Rgba8::RED);
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(quad.vertices[i].position));
        assert!((b - a).cross(c - a).x > 0.0);
    }

    #[test]
    fn packed_color_puts_red_in_low_byte() {
        assert_eq!(Rgba8::new(0x11, 0x22, 0x33, 0x44).packed(), 0x4433_2211);
    }

    #[test]
    fn sphere_vertices_lie_on_unit_radius() {
        let sphere = sphere(16, 8);
        for v in &sphere.vertices {
            assert!((Vec3::from(v.position).length() - 1.0).abs() < 1e-5);
        }
    }
}
