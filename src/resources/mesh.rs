//! Mesh data structures and generation
//!
//! Vertex attributes are kept in separate arrays. Each present attribute is
//! uploaded into its own vertex buffer, and the order of
//! [`MeshData::vertex_slots`] decides the shader `@location` of each one.

use crate::resources::names;
use glam::{Vec2, Vec3, Vec4};

/// Geometry supplied by the asset side for one renderable object
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub tangents: Option<Vec<Vec4>>,
    pub skin_indices: Option<Vec<[u32; 4]>>,
    pub skin_weights: Option<Vec<Vec4>>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tangents(mut self, tangents: Vec<Vec4>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    pub fn without_tangents(mut self) -> Self {
        self.tangents = None;
        self
    }

    pub fn with_skin(mut self, indices: Vec<[u32; 4]>, weights: Vec<Vec4>) -> Self {
        self.skin_indices = Some(indices);
        self.skin_weights = Some(weights);
        self
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Number of elements the draw call consumes
    pub fn element_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertex_count(),
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.skin_indices.is_some() && self.skin_weights.is_some()
    }

    /// Names of the vertex slots this mesh provides, in `@location` order
    pub fn vertex_slots(&self) -> Vec<&'static str> {
        let mut slots = vec![names::POSITION, names::NORMAL, names::UV];
        if self.tangents.is_some() {
            slots.push(names::TANGENT);
        }
        if self.is_skinned() {
            slots.push(names::SKIN_INDEX);
            slots.push(names::SKIN_WEIGHT);
        }
        slots
    }

    /// Raw bytes for one vertex slot
    pub fn slot_bytes(&self, slot: &str) -> Option<&[u8]> {
        match slot {
            names::POSITION => Some(bytemuck::cast_slice(&self.positions)),
            names::NORMAL => Some(bytemuck::cast_slice(&self.normals)),
            names::UV => Some(bytemuck::cast_slice(&self.uvs)),
            names::TANGENT => self.tangents.as_deref().map(bytemuck::cast_slice),
            names::SKIN_INDEX => self.skin_indices.as_deref().map(bytemuck::cast_slice),
            names::SKIN_WEIGHT => self.skin_weights.as_deref().map(bytemuck::cast_slice),
            _ => None,
        }
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> Option<&[u8]> {
        self.indices.as_deref().map(bytemuck::cast_slice)
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = MeshData::new("cube");

        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];

        let mut tangents = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, right)) in faces.into_iter().enumerate() {
            let up = normal.cross(right);
            let corners = [
                (-right - up, Vec2::new(0.0, 1.0)),
                (right - up, Vec2::new(1.0, 1.0)),
                (right + up, Vec2::new(1.0, 0.0)),
                (-right + up, Vec2::new(0.0, 0.0)),
            ];
            for (offset, uv) in corners {
                mesh.positions.push((normal + offset) * 0.5);
                mesh.normals.push(normal);
                mesh.uvs.push(uv);
                tangents.push(right.extend(1.0));
            }

            let base = face as u32 * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh.tangents = Some(tangents);
        mesh.indices = Some(indices);
        mesh
    }

    /// Create a UV sphere of radius 0.5
    pub fn uv_sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = MeshData::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        let mut tangents = Vec::new();
        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                mesh.positions.push(Vec3::new(x, y, z) * 0.5);
                mesh.normals.push(Vec3::new(x, y, z).normalize_or_zero());
                mesh.uvs.push(Vec2::new(
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                ));
                tangents.push(Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0));
            }
        }

        // Counter-clockwise seen from outside
        let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh.tangents = Some(tangents);
        mesh.indices = Some(indices);
        mesh
    }

    /// Create a plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32) -> Self {
        let mut mesh = MeshData::new("plane");
        let (hw, hd) = (width / 2.0, depth / 2.0);

        for (x, z, u, v) in [
            (-hw, -hd, 0.0, 0.0),
            (-hw, hd, 0.0, 1.0),
            (hw, hd, 1.0, 1.0),
            (hw, -hd, 1.0, 0.0),
        ] {
            mesh.positions.push(Vec3::new(x, 0.0, z));
            mesh.normals.push(Vec3::Y);
            mesh.uvs.push(Vec2::new(u, v));
        }

        mesh.tangents = Some(vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 4]);
        mesh.indices = Some(vec![0, 1, 2, 0, 2, 3]);
        mesh
    }
}
