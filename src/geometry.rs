// Sample geometry and how each sample feeds it to the pipeline

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved vertex: 2D position followed by an RGB color
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(pos: Vec2, color: Vec3) -> Self {
        Self { pos, color }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        let position = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, pos) as u32)
            .build();

        let color = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, color) as u32)
            .build();

        [position, color]
    }
}

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new(Vec2::new(-0.5, -0.5), Vec3::new(1.0, 1.0, 1.0)),
    Vertex::new(Vec2::new(0.5, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// The two samples shipped by this crate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    /// Vertices are generated in the vertex shader, no buffers involved
    Triangle,
    /// Quad drawn from device-local vertex and index buffers
    IndexedQuad,
}

/// The draw call recorded into every frame's command buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCall {
    Vertices { count: u32 },
    Indexed { count: u32 },
}

impl Sample {
    pub fn title(self) -> &'static str {
        match self {
            Sample::Triangle => "Hello Triangle",
            Sample::IndexedQuad => "Vertex & Index Buffers",
        }
    }

    pub fn vertex_shader(self) -> &'static str {
        match self {
            Sample::Triangle => "triangle.vert.spv",
            Sample::IndexedQuad => "quad.vert.spv",
        }
    }

    pub fn fragment_shader(self) -> &'static str {
        "color.frag.spv"
    }

    pub fn uses_buffers(self) -> bool {
        matches!(self, Sample::IndexedQuad)
    }

    pub fn draw_call(self) -> DrawCall {
        match self {
            Sample::Triangle => DrawCall::Vertices { count: 3 },
            Sample::IndexedQuad => DrawCall::Indexed {
                count: QUAD_INDICES.len() as u32,
            },
        }
    }

    /// Vertex bindings and attributes the pipeline expects
    pub fn vertex_input(
        self,
    ) -> (
        Vec<vk::VertexInputBindingDescription>,
        Vec<vk::VertexInputAttributeDescription>,
    ) {
        if self.uses_buffers() {
            (
                vec![Vertex::binding_description()],
                Vertex::attribute_descriptions().to_vec(),
            )
        } else {
            (Vec::new(), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);

        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 20);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let [position, color] = Vertex::attribute_descriptions();
        assert_eq!((position.location, position.offset), (0, 0));
        assert_eq!(position.format, vk::Format::R32G32_SFLOAT);
        assert_eq!((color.location, color.offset), (1, 8));
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn quad_indices_stay_in_bounds() {
        assert!(QUAD_INDICES
            .iter()
            .all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn upload_sizes_match_the_data() {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&QUAD_INDICES);
        assert_eq!(vertex_bytes.len(), 4 * 20);
        assert_eq!(index_bytes.len(), 6 * 2);

        // second vertex starts with its x position
        let x = f32::from_ne_bytes(vertex_bytes[20..24].try_into().unwrap());
        assert_eq!(x, 0.5);
    }

    #[test]
    fn indexed_draw_covers_the_uploaded_indices() {
        let DrawCall::Indexed { count } = Sample::IndexedQuad.draw_call() else {
            panic!("quad sample must draw indexed");
        };
        assert_eq!(count as usize, QUAD_INDICES.len());
    }

    #[test]
    fn samples_pick_their_draw_call() {
        assert_eq!(Sample::Triangle.draw_call(), DrawCall::Vertices { count: 3 });
        assert_eq!(Sample::IndexedQuad.draw_call(), DrawCall::Indexed { count: 6 });
    }

    #[test]
    fn triangle_has_no_vertex_input() {
        let (bindings, attributes) = Sample::Triangle.vertex_input();
        assert!(bindings.is_empty());
        assert!(attributes.is_empty());

        let (bindings, attributes) = Sample::IndexedQuad.vertex_input();
        assert_eq!(bindings.len(), 1);
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn samples_share_the_fragment_shader() {
        assert_ne!(Sample::Triangle.vertex_shader(), Sample::IndexedQuad.vertex_shader());
        assert_eq!(
            Sample::Triangle.fragment_shader(),
            Sample::IndexedQuad.fragment_shader()
        );
    }
}
