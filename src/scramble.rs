use image::{imageops, GenericImageView, RgbaImage};

/// Tiles are aligned to the publisher encoder's 8 pixel block grid.
const TILE_ALIGN: u32 = 8;

/// 32-bit xorshift generator used by the publishers to derive tile order.
/// The state must be non-zero; each step is the 13/17/5 shift triple and the
/// output is the post-step state.
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn new(seed: u32) -> Self {
        Xorshift32 { state: seed }
    }

    pub fn next(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }
}

/// Deterministic tile permutation for a `count`-tile grid.
///
/// Draws `count` values from a freshly seeded generator, pairs each with its
/// index and stable-sorts by the unsigned 32-bit key. The index column is
/// the permutation: destination tile `i` takes its pixels from source tile
/// `order[i]`.
pub fn tile_order(count: usize, seed: u32) -> Vec<usize> {
    let mut gen = Xorshift32::new(seed);
    let mut pairs: Vec<(u32, usize)> = (0..count).map(|i| (gen.next(), i)).collect();
    pairs.sort_by_key(|&(key, _)| key);
    pairs.into_iter().map(|(_, i)| i).collect()
}

struct Grid {
    tile_w: u32,
    tile_h: u32,
}

fn grid(width: u32, height: u32, tile_count: u32) -> Option<Grid> {
    if width < tile_count * TILE_ALIGN || height < tile_count * TILE_ALIGN {
        return None;
    }
    Some(Grid {
        tile_w: width / TILE_ALIGN / tile_count * TILE_ALIGN,
        tile_h: height / TILE_ALIGN / tile_count * TILE_ALIGN,
    })
}

fn permute_tiles(img: &RgbaImage, seed: u32, tile_count: u32, forward: bool) -> RgbaImage {
    let (width, height) = img.dimensions();
    let Some(grid) = grid(width, height, tile_count) else {
        // Below the tileable threshold the publisher leaves images alone.
        return img.clone();
    };

    let mut out = RgbaImage::new(width, height);
    let order = tile_order((tile_count * tile_count) as usize, seed);

    for (i, &p) in order.iter().enumerate() {
        let (src_idx, dst_idx) = if forward { (i, p) } else { (p, i) };
        let src_x = (src_idx as u32 % tile_count) * grid.tile_w;
        let src_y = (src_idx as u32 / tile_count) * grid.tile_h;
        let dst_x = (dst_idx as u32 % tile_count) * grid.tile_w;
        let dst_y = (dst_idx as u32 / tile_count) * grid.tile_h;

        let block = img.view(src_x, src_y, grid.tile_w, grid.tile_h).to_image();
        imageops::replace(&mut out, &block, i64::from(dst_x), i64::from(dst_y));
    }

    // The right and bottom borders that fall outside the tileable region are
    // never scrambled; carry them over verbatim.
    let scrambled_w = grid.tile_w * tile_count;
    let scrambled_h = grid.tile_h * tile_count;
    if scrambled_w < width {
        let strip = img.view(scrambled_w, 0, width - scrambled_w, height).to_image();
        imageops::replace(&mut out, &strip, i64::from(scrambled_w), 0);
    }
    if scrambled_h < height {
        let strip = img.view(0, scrambled_h, width, height - scrambled_h).to_image();
        imageops::replace(&mut out, &strip, 0, i64::from(scrambled_h));
    }

    out
}

/// Reconstruct the original raster from a publisher-scrambled one.
/// Output dimensions always equal input dimensions; rasters smaller than
/// `tile_count * 8` in either dimension come back unchanged.
pub fn descramble(img: &RgbaImage, seed: u32, tile_count: u32) -> RgbaImage {
    permute_tiles(img, seed, tile_count, false)
}

/// The forward transform (`destination order[i] <- source i`), the inverse
/// of [`descramble`] for the same seed and tile count.
pub fn scramble(img: &RgbaImage, seed: u32, tile_count: u32) -> RgbaImage {
    permute_tiles(img, seed, tile_count, true)
}
