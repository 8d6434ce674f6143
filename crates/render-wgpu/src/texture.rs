/// Generate `layers` square RGBA8 tile textures of `size` pixels.
///
/// Each layer is a two-tone grass checker with a slightly shifted hue so
/// layers are distinguishable once variants reach the shader.
pub fn procedural_atlas(size: u32, layers: u32) -> Vec<Vec<u8>> {
    let cell = (size / 4).max(1);
    (0..layers)
        .map(|layer| {
            let tint = (layer * 24 % 96) as u8;
            let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
            for y in 0..size {
                for x in 0..size {
                    let light = ((x / cell) + (y / cell)) % 2 == 0;
                    let border = x == 0 || y == 0;
                    let rgba = match (border, light) {
                        (true, _) => [40, 70, 30, 255],
                        (false, true) => [90 + tint, 170, 60, 255],
                        (false, false) => [70 + tint, 140, 50, 255],
                    };
                    pixels.extend_from_slice(&rgba);
                }
            }
            pixels
        })
        .collect()
}

/// Bytes in one RGBA8 layer.
pub(crate) fn layer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atlas_layers_are_full_rgba() {
        let atlas = procedural_atlas(16, 3);
        assert_eq!(atlas.len(), 3);
        for layer in &atlas {
            assert_eq!(layer.len(), layer_len(16, 16));
            assert!(layer.chunks(4).all(|px| px[3] == 255));
        }
    }

    #[test]
    fn layers_differ_by_tint() {
        let atlas = procedural_atlas(8, 2);
        assert_ne!(atlas[0], atlas[1]);
    }

    #[test]
    fn tiny_atlas_does_not_divide_by_zero() {
        let atlas = procedural_atlas(1, 1);
        assert_eq!(atlas[0].len(), 4);
    }
}
