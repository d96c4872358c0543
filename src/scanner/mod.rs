mod exif;

use crate::error::{MoxError, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use exif::apply_orientation;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub date: Option<String>,
}

impl ImageInfo {
    fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            file_name,
            date: exif::extract_date(path).ok(),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "JPG", "JPEG", "PNG"];

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|&e| e == ext.to_string_lossy()))
        .unwrap_or(false)
}

/// カード写真ファイル、またはフォルダ直下の写真を列挙
pub fn scan_input(input: &Path) -> Result<Vec<ImageInfo>> {
    if input.is_file() {
        if !is_image_path(input) {
            return Err(MoxError::ImageLoad(format!(
                "対応していない形式です: {}",
                input.display()
            )));
        }
        return Ok(vec![ImageInfo::from_path(input)]);
    }

    scan_folder(input)
}

pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.exists() {
        return Err(MoxError::FolderNotFound(folder.display().to_string()));
    }

    let mut images: Vec<ImageInfo> = WalkDir::new(folder)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && is_image_path(e.path()))
        .map(|e| ImageInfo::from_path(e.path()))
        .collect();

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

/// カード写真を読み込み、EXIFの向きを反映する
pub fn load_card_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(MoxError::FileNotFound(path.display().to_string()));
    }

    let image = image::open(path)
        .map_err(|e| MoxError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    Ok(match exif::extract_orientation(path) {
        Ok(orientation) => apply_orientation(image, orientation),
        Err(_) => image,
    })
}

/// PNGにエンコード（検出器・OCRへの受け渡し用）
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
