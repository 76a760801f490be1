//! Shared fixtures: an in-process image server and workbook builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;

use pixsheets::{EmbedConfig, Workbook, XlsxDocument, XlsxPackage, XlsxReader, XlsxWriter};

/// Encode a solid `width` x `height` PNG
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[derive(Default)]
struct ServerState {
    hits: Mutex<HashMap<String, usize>>,
}

/// Serves a fixed set of paths on 127.0.0.1 and counts requests per path:
///
/// - `/img.png`, `/other.png`: 200x50 PNG
/// - `/small.png`: 40x30 PNG
/// - `/missing.png`: 404
/// - `/flaky.png`: 503 twice, then a 200x50 PNG
/// - `/down.png`: always 503
/// - `/bad-gateway.png`: 502 once, then a 200x50 PNG
/// - `/gateway-timeout.png`: always 504
/// - `/slow.png`: a 200x50 PNG after two seconds
/// - `/corrupt.png`: 200 with a body that is not an image
pub struct ImageServer {
    base: String,
    state: Arc<ServerState>,
}

impl ImageServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new().fallback(serve).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Requests received for `path`
    pub fn hits(&self, path: &str) -> usize {
        let key = format!("/{}", path.trim_start_matches('/'));
        self.state.hits.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }
}

async fn serve(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let hit = {
        let mut hits = state.hits.lock().unwrap();
        let count = hits.entry(path.clone()).or_insert(0);
        *count += 1;
        *count
    };

    match path.as_str() {
        "/img.png" | "/other.png" => image_response(png(200, 50)),
        "/small.png" => image_response(png(40, 30)),
        "/flaky.png" if hit > 2 => image_response(png(200, 50)),
        "/flaky.png" | "/down.png" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "/bad-gateway.png" if hit > 1 => image_response(png(200, 50)),
        "/bad-gateway.png" => StatusCode::BAD_GATEWAY.into_response(),
        "/gateway-timeout.png" => StatusCode::GATEWAY_TIMEOUT.into_response(),
        "/slow.png" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            image_response(png(200, 50))
        }
        "/corrupt.png" => image_response(b"<html>oops</html>".to_vec()),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn image_response(body: Vec<u8>) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], body).into_response()
}

/// Engine settings confined to `root`, fast retries, no proxy
pub fn test_config(root: &Path) -> EmbedConfig {
    EmbedConfig {
        image_dir: root.join("downloaded_images"),
        output_dir: root.join("excel_with_images"),
        retry_backoff: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
        use_system_proxy: false,
        ..EmbedConfig::default()
    }
}

/// Write a one-sheet workbook with `cells` as `(A1 address, text)` pairs
pub fn write_workbook(path: &Path, cells: &[(&str, &str)]) -> PathBuf {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for (address, text) in cells {
        sheet.set_cell_value(address, *text).unwrap();
    }
    write(path, workbook)
}

pub fn write(path: &Path, workbook: Workbook) -> PathBuf {
    let document = XlsxDocument::from_workbook(workbook).unwrap();
    XlsxWriter::write_file(&document, path).unwrap();
    path.to_path_buf()
}

/// Edit the raw parts of the workbook at `path` and write it back
pub fn rewrite_package(path: &Path, edit: impl FnOnce(&mut XlsxPackage)) {
    let mut package = XlsxReader::read_file(path).unwrap().package().clone();
    edit(&mut package);
    let document = XlsxReader::read_package(package).unwrap();
    XlsxWriter::write_file(&document, path).unwrap();
}

/// Turn the workbook at `path` into a macro-enabled one carrying a VBA project
pub fn add_vba_project(path: &Path) {
    rewrite_package(path, |package| {
        let types = String::from_utf8(package.part("[Content_Types].xml").unwrap().to_vec())
            .unwrap()
            .replace(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
                "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
            )
            .replace(
                "</Types>",
                r#"<Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/></Types>"#,
            );
        package.set_part("[Content_Types].xml", types.into_bytes());

        let rels = String::from_utf8(package.part("xl/_rels/workbook.xml.rels").unwrap().to_vec())
            .unwrap()
            .replace(
                "</Relationships>",
                r#"<Relationship Id="rId99" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/></Relationships>"#,
            );
        package.set_part("xl/_rels/workbook.xml.rels", rels.into_bytes());
        package.set_part("xl/vbaProject.bin", b"vba".to_vec());
    });
}

/// A part of the package at `path` as text
pub fn read_part(path: &Path, part: &str) -> Option<String> {
    let document = pixsheets::XlsxReader::read_file(path).unwrap();
    document
        .package()
        .part(part)
        .map(|bytes| String::from_utf8(bytes.to_vec()).unwrap())
}

/// Media parts of the package at `path`
pub fn media_parts(path: &Path) -> Vec<String> {
    let document = pixsheets::XlsxReader::read_file(path).unwrap();
    document
        .package()
        .part_names()
        .filter(|n| n.starts_with("xl/media/"))
        .map(str::to_string)
        .collect()
}
