//! Reads still images and frame directories from disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbaImage;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Frame files in a directory, sorted by file name.
pub fn frame_paths(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(input)
        .with_context(|| format!("failed to read frame directory {}", input.display()))?
    {
        let path = entry?.path();
        if path.is_file() && has_frame_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    if paths.is_empty() {
        bail!("no image frames found in {}", input.display());
    }
    Ok(paths)
}

pub fn load_frame(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(image.into_rgba8())
}

pub fn load_first_frame(input: &Path) -> Result<RgbaImage> {
    let paths = frame_paths(input)?;
    match paths.first() {
        Some(path) => load_frame(path),
        None => bail!("no image frames found in {}", input.display()),
    }
}

pub fn load_frames(input: &Path) -> Result<Vec<RgbaImage>> {
    let paths = frame_paths(input)?;
    let frames = paths
        .iter()
        .map(|path| load_frame(path))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(count = frames.len(), input = %input.display(), "loaded frames");
    Ok(frames)
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
