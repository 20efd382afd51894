//! First-page PDF rasterization.
//!
//! Converts an in-memory PDF into a single PNG of its first page at a
//! fixed 4x scale, packaged as an uploadable in-memory file plus a
//! dereferenceable data URL. The conversion is a total function: every
//! outcome, including backend and encode failures, comes back as a
//! [`PdfConversionResult`] — it never returns `Err`.
//!
//! The pdfium binding is acquired once and reused for the lifetime of
//! the process; concurrent first calls race on a `OnceCell`, so the
//! library is initialized at most once.

use std::io::Cursor;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use image::ImageFormat;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::capability::{FileLike, MemoryFile};

/// Fixed scale factor applied to the page's nominal size.
const RENDER_SCALE: f32 = 4.0;

/// Sentinel for a missing render backend — a capability check, not an
/// exception, so it is reported verbatim without the generic wrapper.
pub const BACKEND_UNAVAILABLE: &str = "PDF render backend not available";
/// Sentinel prefix for a failed PNG encode.
pub const ENCODE_FAILED: &str = "failed to encode PNG image";

/// Outcome of one conversion. Exactly one of `file` / `error` is
/// populated; `image_url` is non-empty iff `file` is.
#[derive(Debug, Clone, Default)]
pub struct PdfConversionResult {
    pub image_url: String,
    pub file: Option<MemoryFile>,
    pub error: Option<String>,
}

impl PdfConversionResult {
    fn success(file: MemoryFile, image_url: String) -> Self {
        Self { image_url, file: Some(file), error: None }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self { image_url: String::new(), file: None, error: Some(error.into()) }
    }
}

/// Seam for the pipeline: swap the backend in tests without a native
/// pdfium library on the machine.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, source: &dyn FileLike) -> PdfConversionResult;
}

/// Default backend, rendering through pdfium.
pub struct PdfiumRasterizer;

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, source: &dyn FileLike) -> PdfConversionResult {
        pdf_to_image(source).await
    }
}

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Binds the pdfium library once; every later call reuses the handle.
fn pdfium() -> Option<&'static Pdfium> {
    PDFIUM
        .get_or_try_init(|| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map(Pdfium::new)
        })
        .ok()
}

/// Converts the first page of `source` into a PNG at 4x scale.
pub async fn pdf_to_image(source: &dyn FileLike) -> PdfConversionResult {
    let bytes = match source.read_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return PdfConversionResult::failure(format!("conversion failed: {e}")),
    };

    let image_name = image_file_name(source.name());
    match render_first_page(bytes).await {
        Ok(png) => {
            let image_url = format!("data:image/png;base64,{}", BASE64.encode(&png));
            debug!("rasterized {} ({} bytes of PNG)", image_name, png.len());
            PdfConversionResult::success(MemoryFile::new(image_name, png), image_url)
        }
        Err(RasterizeError::BackendUnavailable) => PdfConversionResult::failure(BACKEND_UNAVAILABLE),
        Err(RasterizeError::Encode(e)) => {
            PdfConversionResult::failure(format!("{ENCODE_FAILED}: {e}"))
        }
        Err(RasterizeError::Render(e)) => {
            PdfConversionResult::failure(format!("conversion failed: {e}"))
        }
    }
}

#[derive(Debug)]
enum RasterizeError {
    BackendUnavailable,
    Render(String),
    Encode(String),
}

async fn render_first_page(bytes: Bytes) -> Result<Vec<u8>, RasterizeError> {
    // Rendering is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || render_first_page_blocking(&bytes))
        .await
        .map_err(|e| RasterizeError::Render(e.to_string()))?
}

fn render_first_page_blocking(bytes: &[u8]) -> Result<Vec<u8>, RasterizeError> {
    let pdfium = pdfium().ok_or(RasterizeError::BackendUnavailable)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| RasterizeError::Render(format!("{e:?}")))?;
    let page = document
        .pages()
        .get(0)
        .map_err(|e| RasterizeError::Render(format!("{e:?}")))?;

    let width = (page.width().value * RENDER_SCALE) as i32;
    let height = (page.height().value * RENDER_SCALE) as i32;
    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| RasterizeError::Render(format!("{e:?}")))?;

    let mut buffer = Vec::new();
    bitmap
        .as_image()
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| RasterizeError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// `<stem>.png`, case-insensitively swapping a `.pdf` suffix; names
/// without one get `.png` appended.
pub fn image_file_name(name: &str) -> String {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf") {
        format!("{}.png", &name[..len - 4])
    } else {
        format!("{name}.png")
    }
}
