use crate::cookies::Cookie;
use crate::error::{DownloadError, Result};
use crate::http_client::{image_headers, Fetcher};
use crate::models::{ComicManifest, PageFormat, PageRef, Source};
use crate::scramble::descramble;
use crate::sources::{gigaviewer, pocket_magazine};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Every supported publisher scrambles on a 4x4 grid.
pub const TILE_COUNT: u32 = 4;

/// Per-source fetch recipe shared by every page of a manifest.
pub struct PageContext<'a> {
    pub source: Source,
    pub cookies: &'a [Cookie],
    pub scramble_seed: Option<u32>,
    pub jpeg_quality: u8,
}

impl<'a> PageContext<'a> {
    pub fn from_manifest(manifest: &'a ComicManifest, jpeg_quality: u8) -> Self {
        Self {
            source: manifest.source,
            cookies: &manifest.cookies,
            scramble_seed: manifest.scramble_seed,
            jpeg_quality,
        }
    }

    fn referer(&self) -> Option<&'static str> {
        match self.source {
            Source::PocketMagazine => Some(pocket_magazine::PAGE_REFERER),
            Source::ComicDays | Source::Ourfeel => None,
        }
    }

    fn seed_for(&self, page: &PageRef) -> Option<u32> {
        match page {
            PageRef::Manifest { src, .. } => Some(gigaviewer::page_seed(src)),
            PageRef::Listed { .. } => self.scramble_seed,
        }
    }
}

/// Download one page, reconstruct it and write `NNN.png`/`NNN.jpg` (1-based,
/// zero-padded) into `out_dir`. Returns the path written.
pub async fn process_page<F: Fetcher>(
    fetcher: &F,
    page: &PageRef,
    ctx: &PageContext<'_>,
    out_dir: &Path,
    page_num: usize,
) -> Result<PathBuf> {
    let encoded = fetch_and_transform(fetcher, page, ctx).await?;
    let format = ctx.source.page_format();
    ensure_dir(out_dir)?;
    let path = out_dir.join(format!("{page_num:03}.{}", format.extension()));
    write_atomic(&path, &encoded)?;
    Ok(path)
}

/// Process the first page entirely in memory and return it as a data URL
/// for the shell's preview.
pub async fn render_thumbnail<F: Fetcher>(
    fetcher: &F,
    manifest: &ComicManifest,
    jpeg_quality: u8,
) -> Result<String> {
    let page = manifest
        .pages
        .first()
        .ok_or_else(|| DownloadError::Parse("manifest has no pages".into()))?;
    let ctx = PageContext::from_manifest(manifest, jpeg_quality);
    let encoded = fetch_and_transform(fetcher, page, &ctx).await?;
    let format = manifest.source.page_format();
    Ok(format!(
        "data:{};base64,{}",
        format.mime(),
        STANDARD.encode(&encoded)
    ))
}

async fn fetch_and_transform<F: Fetcher>(
    fetcher: &F,
    page: &PageRef,
    ctx: &PageContext<'_>,
) -> Result<Vec<u8>> {
    let bytes = fetcher
        .fetch(page.src(), image_headers(ctx.referer()), ctx.cookies, None)
        .await?;
    transform(&bytes, ctx.seed_for(page), ctx.source.page_format(), ctx.jpeg_quality)
}

/// Decode, descramble when a seed applies, and re-encode. Image bytes stay
/// in raw buffers throughout.
pub fn transform(
    bytes: &[u8],
    seed: Option<u32>,
    format: PageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgba8();
    let restored = match seed {
        Some(seed) => descramble(&img, seed, TILE_COUNT),
        None => img,
    };
    encode(restored, format, jpeg_quality)
}

pub fn encode(img: RgbaImage, format: PageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        PageFormat::Png => {
            DynamicImage::ImageRgba8(img).write_to(&mut buffer, ImageFormat::Png)?;
        }
        PageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).into_rgb8();
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, jpeg_quality))?;
        }
    }
    Ok(buffer.into_inner())
}

/// Create the download target directory (0755) if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    ensure_dir(dir)?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Write through a sibling temp file and rename, so a crash never leaves a
/// truncated page on disk.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("part");
    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(bytes)?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scramble::Xorshift32;

    fn pattern_image(width: u32, height: u32) -> RgbaImage {
        let mut gen = Xorshift32::new(99);
        RgbaImage::from_fn(width, height, |_, _| {
            let v = gen.next();
            image::Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, 255])
        })
    }

    #[test]
    fn transform_reencodes_jpeg_as_png_with_same_dimensions() {
        let jpeg = encode(pattern_image(64, 48), PageFormat::Jpeg, 95).unwrap();
        let png = transform(&jpeg, None, PageFormat::Png, 95).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn transform_rejects_non_jpeg_bytes() {
        let err = transform(b"not an image", None, PageFormat::Jpeg, 95).unwrap_err();
        assert!(matches!(err, DownloadError::Decode(_)));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001.jpg");
        write_atomic(&path, b"data").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"data");
        assert!(!dir.path().join("001.part").exists());
    }

    #[test]
    fn ensure_output_dir_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // A second call is a no-op.
        ensure_output_dir(&nested).unwrap();
    }
}
