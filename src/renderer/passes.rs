//! Command recording for each frame phase.

use super::{GpuObject, Renderer, SatPass};
use crate::shadow::Moments;

fn draw_object(pass: &mut wgpu::RenderPass<'_>, object: &GpuObject) {
    pass.set_bind_group(1, &object.bind_group, &[]);
    pass.set_vertex_buffer(0, object.mesh.vertex_buffer.slice(..));
    pass.set_index_buffer(object.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..object.mesh.index_count, 0, 0..1);
}

impl Renderer {
    /// Rasterize casters from the light into the moment map.
    pub(super) fn encode_capture_depth(&self, encoder: &mut wgpu::CommandEncoder) {
        let clear = Moments::CLEAR;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("moment_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.moment_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.depth as f64,
                        g: clear.depth_sq as f64,
                        b: 0.0,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.light_depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipelines.moment_pipeline);
        pass.set_bind_group(0, &self.moment_pass_bind_group, &[]);
        for object in self.objects.values() {
            draw_object(&mut pass, object);
        }
    }

    /// One scan over every row, transposing into the next ping-pong texture.
    ///
    /// Each sub-pass is its own compute pass, so the storage writes of the
    /// row pass are visible to the column pass.
    pub(super) fn encode_sat_pass(&self, encoder: &mut wgpu::CommandEncoder, sat_pass: SatPass) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(sat_pass.label()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.sat_pipelines[sat_pass.index()]);
        pass.set_bind_group(0, &self.sat_bind_groups[sat_pass.index()], &[]);
        pass.dispatch_workgroups(self.targets.size, 1, 1);
    }

    /// Shade every object with the selected shadow filter.
    pub(super) fn encode_shading(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let Some(depth) = &self.depth_texture else {
            return;
        };
        let [r, g, b] = self.clear_color;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("surface_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipelines.surface_pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for object in self.objects.values() {
            draw_object(&mut pass, object);
        }
    }

    /// Light marker and moment-map overlay on top of the shaded frame.
    pub(super) fn encode_present(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        if !self.show_light_marker && !self.show_debug_overlay {
            return;
        }
        let Some(depth) = &self.depth_texture else {
            return;
        };
        let (width, height) = depth.size;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if self.show_light_marker {
            pass.set_pipeline(&self.pipelines.marker_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            draw_object(&mut pass, &self.marker);
        }

        if self.show_debug_overlay {
            // Lower-left square, a quarter of the frame width
            let side = (width / 4).min(height).max(1) as f32;
            pass.set_viewport(0.0, height as f32 - side, side, side, 0.0, 1.0);
            pass.set_pipeline(&self.pipelines.debug_pipeline);
            pass.set_bind_group(0, &self.debug_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
