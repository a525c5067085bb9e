//! CPU reference for the image-based lighting integrals
//!
//! These mirror the compute templates sample for sample and are used to
//! check the numerical behaviour of the precompute without a GPU.

use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Van der Corput radical inverse in base 2
pub fn radical_inverse_vdc(bits: u32) -> f32 {
    bits.reverse_bits() as f32 * 2.328_306_4e-10
}

/// `i`-th point of a Hammersley set of `count` points in [0, 1)^2
pub fn hammersley(i: u32, count: u32) -> Vec2 {
    Vec2::new(i as f32 / count.max(1) as f32, radical_inverse_vdc(i))
}

/// GGX-distributed half vector around `n`
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent_x = up.cross(n).normalize();
    let tangent_y = n.cross(tangent_x);
    (tangent_x * (phi.cos() * sin_theta) + tangent_y * (phi.sin() * sin_theta) + n * cos_theta).normalize()
}

fn visibility_smith_correlated(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let ggx_v = n_dot_l * (n_dot_v * n_dot_v * (1.0 - a2) + a2).sqrt();
    let ggx_l = n_dot_v * (n_dot_l * n_dot_l * (1.0 - a2) + a2).sqrt();
    0.5 / (ggx_v + ggx_l).max(1e-4)
}

/// Split-sum (scale, bias) applied to F0, clamped to [0, 1]
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, sample_count: u32) -> Vec2 {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;
    let mut scale = 0.0;
    let mut bias = 0.0;

    for i in 0..sample_count {
        let h = importance_sample_ggx(hammersley(i, sample_count), n, roughness);
        let l = 2.0 * v.dot(h) * h - v;
        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 {
            let vis = visibility_smith_correlated(n_dot_v, n_dot_l, roughness);
            let g_vis = 4.0 * vis * n_dot_l * v_dot_h / n_dot_h.max(1e-4);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }

    (Vec2::new(scale, bias) / sample_count.max(1) as f32).clamp(Vec2::ZERO, Vec2::ONE)
}

/// Energy the single-scatter model loses at F0 = 1, `1 - E(mu)`
pub fn energy_compensation_emu(n_dot_v: f32, roughness: f32, sample_count: u32) -> f32 {
    let e = integrate_brdf(n_dot_v, roughness, sample_count);
    (1.0 - (e.x + e.y)).clamp(0.0, 1.0)
}

/// Mean of the Emu row for `roughness` over `columns` view angles
pub fn energy_compensation_eavg(roughness: f32, columns: u32, sample_count: u32) -> f32 {
    let columns = columns.max(1);
    let total: f32 = (0..columns)
        .map(|i| {
            let n_dot_v = (i as f32 + 0.5) / columns as f32;
            energy_compensation_emu(n_dot_v, roughness, sample_count)
        })
        .sum();
    total / columns as f32
}
