use crate::error::{UnderlayError, UnderlayResult};

/// Separable gaussian blur over a premultiplied RGBA8 buffer.
///
/// Weights are fixed-point Q16 so the result is bit-stable across platforms.
pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> UnderlayResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| UnderlayError::validation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(UnderlayError::validation(
            "blur_rgba8_premul expects src matching width*height*4",
        ));
    }
    if radius == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    // Horizontal, then vertical: same kernel, different walk direction.
    convolve_pass(src, &mut tmp, width, height, &kernel, Axis::X);
    convolve_pass(&tmp, &mut out, width, height, &kernel, Axis::Y);
    Ok(out)
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn convolve_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    let limit = match axis {
        Axis::X => w,
        Axis::Y => h,
    };

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            let along = match axis {
                Axis::X => x,
                Axis::Y => y,
            };
            for (ki, &kw) in k.iter().enumerate() {
                let tap = (along + ki as i32 - radius).clamp(0, limit - 1);
                let (sx, sy) = match axis {
                    Axis::X => (tap, y),
                    Axis::Y => (x, tap),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> UnderlayResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(UnderlayError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|&wf| (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536) as u32)
        .collect();

    // Push rounding residue into the center tap so the kernel sums to 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}
