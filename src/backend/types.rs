//! Backend-agnostic resource and pipeline descriptors.

use bitflags::bitflags;

/// Largest push constant block any pipeline may declare.
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of mip `level` for a chain whose base is `self`. Never collapses below 1x1.
    pub fn mip(self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }

    /// Halved extent, clamped to 1x1.
    pub fn half(self) -> Self {
        self.mip(1)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        )
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        const RENDER_ATTACHMENT = 1 << 0;
        const SAMPLED = 1 << 1;
        const STORAGE = 1 << 2;
        const COPY_SRC = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsages: u32 {
        const UNIFORM = 1 << 0;
        const STORAGE = 1 << 1;
        const VERTEX = 1 << 2;
        const INDEX = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    /// Six square layers sampled as a cube.
    Cube,
}

impl TextureDimension {
    pub fn layers(self) -> u32 {
        match self {
            TextureDimension::D2 => 1,
            TextureDimension::Cube => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: &'static str,
    pub extent: Extent,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub dimension: TextureDimension,
}

impl TextureDescriptor {
    pub fn render_target(label: &'static str, extent: Extent, format: TextureFormat) -> Self {
        Self {
            label,
            extent,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::SAMPLED,
            dimension: TextureDimension::D2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    pub label: &'static str,
    pub size: u64,
    pub usage: BufferUsages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: &'static str,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
    pub compare: Option<CompareFunction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    Float { filterable: bool },
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    D2,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerBindingType {
    Filtering,
    NonFiltering,
    Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer { read_only: bool },
    Texture {
        sample_type: TextureSampleType,
        dimension: TextureViewDimension,
    },
    /// Write-only storage texture.
    StorageTexture { format: TextureFormat },
    Sampler(SamplerBindingType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    pub const fn new(binding: u32, visibility: ShaderStages, ty: BindingType) -> Self {
        Self {
            binding,
            visibility,
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stages: ShaderStages,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineLayoutDescriptor {
    /// One entry list per bind group index.
    pub bind_groups: Vec<Vec<BindGroupLayoutEntry>>,
    pub push_constants: Option<PushConstantRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: &'static str,
    pub wgsl: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant: i32,
    pub slope_scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthState {
    pub format: TextureFormat,
    pub write_enabled: bool,
    pub compare: CompareFunction,
    pub bias: Option<DepthBias>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Replace,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTarget {
    pub format: TextureFormat,
    pub blend: BlendMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor {
    pub label: &'static str,
    pub shader: ShaderSource,
    pub vertex_entry: &'static str,
    pub fragment_entry: Option<&'static str>,
    pub layout: PipelineLayoutDescriptor,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub color_targets: Vec<ColorTarget>,
    pub depth: Option<DepthState>,
    pub cull_mode: Option<Face>,
    pub front_face: FrontFace,
    /// WGSL `override` values baked in at pipeline creation.
    pub constants: Vec<(&'static str, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputePipelineDescriptor {
    pub label: &'static str,
    pub shader: ShaderSource,
    pub entry_point: &'static str,
    pub layout: PipelineLayoutDescriptor,
    pub constants: Vec<(&'static str, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_halves_and_clamps() {
        let base = Extent::new(1280, 720);
        assert_eq!(base.mip(0), base);
        assert_eq!(base.mip(1), Extent::new(640, 360));
        assert_eq!(base.mip(4), Extent::new(80, 45));
        assert_eq!(base.mip(11), Extent::new(1, 1));
        assert_eq!(Extent::new(3, 1).half(), Extent::new(1, 1));
    }

    #[test]
    fn cube_textures_have_six_layers() {
        assert_eq!(TextureDimension::Cube.layers(), 6);
        assert_eq!(TextureDimension::D2.layers(), 1);
    }
}
