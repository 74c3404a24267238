use crate::device::TextureKind;
use crate::error::AssetError;

/// CPU-side RGBA8 texture data, ready for [`Device::create_texture`](crate::Device::create_texture).
///
/// Cube maps store their six faces back to back in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Color data is sRGB encoded. Normal maps and other data textures are linear.
    pub srgb: bool,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wraps raw RGBA pixels, checking the length against the dimensions.
    pub fn new(
        name: &str,
        kind: TextureKind,
        width: u32,
        height: u32,
        srgb: bool,
        pixels: Vec<u8>,
    ) -> Result<Self, AssetError> {
        let expected = (width * height * 4) as usize * kind.layers() as usize;
        if pixels.len() != expected {
            return Err(AssetError::BadTextureData {
                name: name.to_string(),
                got: pixels.len(),
                expected,
            });
        }
        Ok(Self {
            kind,
            width,
            height,
            srgb,
            pixels,
        })
    }

    /// Decode an image file held in memory (PNG or JPEG).
    pub fn from_image_bytes(bytes: &[u8], srgb: bool) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            kind: TextureKind::D2,
            width,
            height,
            srgb,
            pixels: img.into_raw(),
        })
    }

    pub fn layers(&self) -> u32 {
        self.kind.layers()
    }

    /// Generate a brick-pattern diffuse texture.
    pub fn bricks(size: u32, seed: u32) -> Self {
        let mut pixels = vec![0u8; (size * size * 4) as usize];
        let brick_h = (size / 8).max(2);
        let brick_w = brick_h * 2;

        for y in 0..size {
            let row = y / brick_h;
            // Every other row is offset by half a brick
            let offset = if row % 2 == 0 { 0 } else { brick_w / 2 };
            for x in 0..size {
                let idx = ((y * size + x) * 4) as usize;
                let bx = (x + offset) / brick_w;
                let in_mortar = y % brick_h == 0 || (x + offset) % brick_w == 0;

                let (base, jitter) = if in_mortar {
                    ([190i32, 185, 175], (hash(x, y, seed) % 12) as i32 - 6)
                } else {
                    let tone = (hash(bx, row, seed) % 40) as i32 - 20;
                    (
                        [150 + tone, 60 + tone / 2, 45 + tone / 3],
                        (hash(x + 700, y + 700, seed) % 16) as i32 - 8,
                    )
                };

                pixels[idx] = (base[0] + jitter).clamp(0, 255) as u8;
                pixels[idx + 1] = (base[1] + jitter).clamp(0, 255) as u8;
                pixels[idx + 2] = (base[2] + jitter).clamp(0, 255) as u8;
                pixels[idx + 3] = 255;
            }
        }

        Self {
            kind: TextureKind::D2,
            width: size,
            height: size,
            srgb: true,
            pixels,
        }
    }

    /// Generate a tangent-space normal map matching [`TextureData::bricks`]:
    /// flat bricks with mortar grooves sloping inward.
    pub fn brick_normals(size: u32) -> Self {
        let mut pixels = vec![0u8; (size * size * 4) as usize];
        let brick_h = (size / 8).max(2);
        let brick_w = brick_h * 2;

        for y in 0..size {
            let row = y / brick_h;
            let offset = if row % 2 == 0 { 0 } else { brick_w / 2 };
            for x in 0..size {
                let idx = ((y * size + x) * 4) as usize;
                let local_x = (x + offset) % brick_w;
                let local_y = y % brick_h;

                let mut n = [0.0f32, 0.0, 1.0];
                if local_x == 0 {
                    n[0] = 0.6;
                } else if local_x == brick_w - 1 {
                    n[0] = -0.6;
                }
                if local_y == 0 {
                    n[1] = 0.6;
                } else if local_y == brick_h - 1 {
                    n[1] = -0.6;
                }
                let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();

                for c in 0..3 {
                    pixels[idx + c] = (((n[c] / len) * 0.5 + 0.5) * 255.0).round() as u8;
                }
                pixels[idx + 3] = 255;
            }
        }

        Self {
            kind: TextureKind::D2,
            width: size,
            height: size,
            srgb: false,
            pixels,
        }
    }

    /// Generate a vertical-gradient sky cube map: deep blue overhead, pale at the
    /// horizon, dark below, with sparse stars in the upper hemisphere.
    pub fn sky_gradient(size: u32, seed: u32) -> Self {
        const ZENITH: [f32; 3] = [40.0, 70.0, 150.0];
        const HORIZON: [f32; 3] = [190.0, 200.0, 225.0];
        const GROUND: [f32; 3] = [45.0, 40.0, 50.0];

        let face_len = (size * size * 4) as usize;
        let mut pixels = vec![0u8; face_len * 6];

        for face in 0..6u32 {
            for y in 0..size {
                for x in 0..size {
                    let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let dir = cube_direction(face, u, v);
                    let len = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
                    let up = dir[1] / len;

                    let mut color = if up >= 0.0 {
                        lerp3(HORIZON, ZENITH, up.powf(0.6))
                    } else {
                        lerp3(HORIZON, GROUND, (-up).powf(0.4))
                    };

                    if up > 0.2 && hash(x + face * size, y, seed) % 997 == 0 {
                        color = [255.0, 255.0, 240.0];
                    }

                    let idx = face as usize * face_len + ((y * size + x) * 4) as usize;
                    pixels[idx] = color[0] as u8;
                    pixels[idx + 1] = color[1] as u8;
                    pixels[idx + 2] = color[2] as u8;
                    pixels[idx + 3] = 255;
                }
            }
        }

        Self {
            kind: TextureKind::Cube,
            width: size,
            height: size,
            srgb: true,
            pixels,
        }
    }
}

impl TextureKind {
    /// Number of array layers backing a texture of this kind.
    pub fn layers(self) -> u32 {
        match self {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        }
    }
}

/// Direction through texel (u, v) of a cube face, following the usual cube map
/// face orientation.
fn cube_direction(face: u32, u: f32, v: f32) -> [f32; 3] {
    match face {
        0 => [1.0, -v, -u],
        1 => [-1.0, -v, u],
        2 => [u, 1.0, v],
        3 => [u, -1.0, -v],
        4 => [u, -v, 1.0],
        _ => [-u, -v, -1.0],
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Simple hash function for procedural generation.
fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_gradient_has_six_faces() {
        let sky = TextureData::sky_gradient(16, 3);
        assert_eq!(sky.kind, TextureKind::Cube);
        assert_eq!(sky.pixels.len(), 16 * 16 * 4 * 6);
    }

    #[test]
    fn sky_is_darker_below_the_horizon() {
        let sky = TextureData::sky_gradient(8, 0);
        let face_len = 8 * 8 * 4;
        // +Y face center vs -Y face center, blue channel
        let top = sky.pixels[2 * face_len + (4 * 8 + 4) * 4 + 2];
        let bottom = sky.pixels[3 * face_len + (4 * 8 + 4) * 4 + 2];
        assert!(top > bottom);
    }

    #[test]
    fn brick_normals_are_flat_inside_bricks() {
        let normals = TextureData::brick_normals(32);
        assert!(!normals.srgb);
        // Texel (5, 5) sits inside the first brick
        let idx = (5 * 32 + 5) * 4;
        assert_eq!(&normals.pixels[idx..idx + 3], &[128, 128, 255]);
    }

    #[test]
    fn texture_data_rejects_wrong_length() {
        let err = TextureData::new("bad", TextureKind::D2, 2, 2, true, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            AssetError::BadTextureData { expected: 16, .. }
        ));
    }
}
