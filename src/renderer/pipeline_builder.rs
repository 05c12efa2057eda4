// src/renderer/pipeline_builder.rs

use crate::backend::{
    BackendResult, BindGroupLayoutEntry, BlendMode, ColorTarget, CompareFunction,
    ComputePipelineDescriptor, DepthBias, DepthState, Face, FrontFace, PipelineHandle,
    PipelineLayoutDescriptor, PushConstantRange, RenderDevice, RenderPipelineDescriptor,
    ShaderSource, ShaderStages, TextureFormat, VertexBufferLayout,
};

/// Builder for render pipelines with sensible defaults
///
/// Defaults to `vs_main`/`fs_main`, back-face culling and counter-clockwise front faces.
pub struct PipelineBuilder {
    desc: RenderPipelineDescriptor,
}

impl PipelineBuilder {
    pub fn new(label: &'static str, shader: ShaderSource) -> Self {
        Self {
            desc: RenderPipelineDescriptor {
                label,
                shader,
                vertex_entry: "vs_main",
                fragment_entry: Some("fs_main"),
                layout: PipelineLayoutDescriptor::default(),
                vertex_buffers: Vec::new(),
                color_targets: Vec::new(),
                depth: None,
                cull_mode: Some(Face::Back),
                front_face: FrontFace::Ccw,
                constants: Vec::new(),
            },
        }
    }

    /// Append a bind group layout at the next group index
    pub fn with_bind_group(mut self, entries: Vec<BindGroupLayoutEntry>) -> Self {
        self.desc.layout.bind_groups.push(entries);
        self
    }

    pub fn with_push_constants(mut self, stages: ShaderStages, size: u32) -> Self {
        self.desc.layout.push_constants = Some(PushConstantRange { stages, size });
        self
    }

    /// Set the vertex shader entry point (default: "vs_main")
    pub fn with_vertex_entry(mut self, entry: &'static str) -> Self {
        self.desc.vertex_entry = entry;
        self
    }

    /// Set the fragment shader entry point (default: "fs_main")
    pub fn with_fragment_entry(mut self, entry: &'static str) -> Self {
        self.desc.fragment_entry = Some(entry);
        self
    }

    /// Create a depth-only pipeline (no fragment shader)
    pub fn depth_only(mut self) -> Self {
        self.desc.fragment_entry = None;
        self
    }

    pub fn with_vertex_buffer(mut self, layout: VertexBufferLayout) -> Self {
        self.desc.vertex_buffers.push(layout);
        self
    }

    pub fn with_color_target(mut self, format: TextureFormat, blend: BlendMode) -> Self {
        self.desc.color_targets.push(ColorTarget { format, blend });
        self
    }

    pub fn with_depth_stencil(
        mut self,
        format: TextureFormat,
        depth_write: bool,
        depth_compare: CompareFunction,
    ) -> Self {
        self.desc.depth = Some(DepthState {
            format,
            write_enabled: depth_write,
            compare: depth_compare,
            bias: None,
        });
        self
    }

    /// Configure depth with a bias (for shadow maps)
    pub fn with_depth_stencil_biased(
        mut self,
        format: TextureFormat,
        depth_write: bool,
        depth_compare: CompareFunction,
        constant_bias: i32,
        slope_bias: f32,
    ) -> Self {
        self.desc.depth = Some(DepthState {
            format,
            write_enabled: depth_write,
            compare: depth_compare,
            bias: Some(DepthBias {
                constant: constant_bias,
                slope_scale: slope_bias,
            }),
        });
        self
    }

    pub fn with_no_culling(mut self) -> Self {
        self.desc.cull_mode = None;
        self
    }

    pub fn with_front_face(mut self, front_face: FrontFace) -> Self {
        self.desc.front_face = front_face;
        self
    }

    /// Bake a WGSL `override` constant into the pipeline
    pub fn with_constant(mut self, name: &'static str, value: f64) -> Self {
        self.desc.constants.push((name, value));
        self
    }

    pub fn descriptor(&self) -> &RenderPipelineDescriptor {
        &self.desc
    }

    pub fn build<D: RenderDevice>(self, device: &mut D) -> BackendResult<PipelineHandle> {
        log::debug!("Creating render pipeline {}", self.desc.label);
        device.create_render_pipeline(&self.desc)
    }
}

/// Compute counterpart of [`PipelineBuilder`], entry point defaults to `cs_main`.
pub struct ComputePipelineBuilder {
    desc: ComputePipelineDescriptor,
}

impl ComputePipelineBuilder {
    pub fn new(label: &'static str, shader: ShaderSource) -> Self {
        Self {
            desc: ComputePipelineDescriptor {
                label,
                shader,
                entry_point: "cs_main",
                layout: PipelineLayoutDescriptor::default(),
                constants: Vec::new(),
            },
        }
    }

    pub fn with_entry(mut self, entry: &'static str) -> Self {
        self.desc.entry_point = entry;
        self
    }

    pub fn with_bind_group(mut self, entries: Vec<BindGroupLayoutEntry>) -> Self {
        self.desc.layout.bind_groups.push(entries);
        self
    }

    pub fn with_constant(mut self, name: &'static str, value: f64) -> Self {
        self.desc.constants.push((name, value));
        self
    }

    pub fn descriptor(&self) -> &ComputePipelineDescriptor {
        &self.desc
    }

    pub fn build<D: RenderDevice>(self, device: &mut D) -> BackendResult<PipelineHandle> {
        log::debug!("Creating compute pipeline {}", self.desc.label);
        device.create_compute_pipeline(&self.desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHADER: ShaderSource = ShaderSource {
        label: "test",
        wgsl: "@vertex fn vs_main() {}",
    };

    #[test]
    fn defaults_cull_back_faces_with_ccw_winding() {
        let builder = PipelineBuilder::new("Test", SHADER);
        let desc = builder.descriptor();
        assert_eq!(desc.vertex_entry, "vs_main");
        assert_eq!(desc.fragment_entry, Some("fs_main"));
        assert_eq!(desc.cull_mode, Some(Face::Back));
        assert_eq!(desc.front_face, FrontFace::Ccw);
    }

    #[test]
    fn depth_only_drops_the_fragment_stage() {
        let builder = PipelineBuilder::new("Shadow", SHADER)
            .depth_only()
            .with_depth_stencil_biased(
                TextureFormat::Depth32Float,
                true,
                CompareFunction::LessEqual,
                2,
                2.0,
            );
        let desc = builder.descriptor();
        assert!(desc.fragment_entry.is_none());
        assert_eq!(desc.depth.and_then(|depth| depth.bias).map(|b| b.constant), Some(2));
    }

    #[test]
    fn override_constants_are_carried_to_the_descriptor() {
        let builder = ComputePipelineBuilder::new("Bloom", SHADER)
            .with_entry("prefilter")
            .with_constant("threshold", 1.5);
        let desc = builder.descriptor();
        assert_eq!(desc.entry_point, "prefilter");
        assert_eq!(desc.constants, vec![("threshold", 1.5)]);
    }
}
