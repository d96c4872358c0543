use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn read_exif(path: &Path) -> Result<exif::Exif> {
    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    Ok(exif::Reader::new().read_from_container(&mut bufreader)?)
}

pub fn extract_date(path: &Path) -> Result<String> {
    let exif = read_exif(path)?;

    // DateTimeOriginal を探す
    if let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) {
        return Ok(field.display_value().to_string());
    }

    // DateTime を探す
    if let Some(field) = exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY) {
        return Ok(field.display_value().to_string());
    }

    Err(anyhow!("No date found in EXIF"))
}

/// EXIF Orientation (1〜8)
pub fn extract_orientation(path: &Path) -> Result<u32> {
    let exif = read_exif(path)?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .ok_or_else(|| anyhow!("No orientation in EXIF"))
}

/// Orientation に従って画像を正立させる
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
