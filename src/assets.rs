// assets.rs - 后台线程解码全景图 / 立方体贴图, 通过 channel 交给渲染线程

use image::io::Reader as ImageReader;
use image::{GenericImage, GenericImageView, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cubemap face {face} is {width}x{height}, faces must be square")]
    CubemapFaceNotSquare { face: usize, width: u32, height: u32 },
    #[error("cubemap face {face} is {got}px, expected {expected}px like face 0")]
    CubemapFaceMismatch { face: usize, got: u32, expected: u32 },
}

#[derive(Debug, Clone)]
pub struct CubemapFaces {
    pub size: u32,
    /// +X, -X, +Y, -Y, +Z, -Z
    pub faces: Vec<RgbaImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Panorama,
    Cubemap,
}

#[derive(Debug)]
pub enum LoadedAsset {
    Panorama(RgbaImage),
    Cubemap(CubemapFaces),
    /// 解码失败也要回传, 否则渲染线程会一直停在加载状态
    Failed { kind: AssetKind, error: AssetError },
}

fn send_or_log(tx: &Sender<LoadedAsset>, asset: LoadedAsset) {
    if tx.send(asset).is_err() {
        log::error!("render thread is gone, dropping loaded asset");
    }
}

pub fn decode_image(path: &Path) -> Result<RgbaImage, AssetError> {
    let file = File::open(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let img = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let (w, h) = img.dimensions();
    log::info!("decoded {:?} ({}x{})", path, w, h);
    Ok(img.to_rgba8())
}

/// Non-2:1 images get padded with black on top so the image keeps its
/// place at the bottom of the equirectangular frame.
pub fn pad_to_equirect(img: RgbaImage) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let target_h = src_w / 2;

    if target_h > 0 && src_h < target_h {
        let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
        // y_offset 已保证不会越界
        let _ = canvas.copy_from(&img, 0, target_h - src_h);
        canvas
    } else {
        img
    }
}

pub fn check_cubemap_faces(faces: Vec<RgbaImage>) -> Result<CubemapFaces, AssetError> {
    let mut size = None;
    for (face, img) in faces.iter().enumerate() {
        let (width, height) = img.dimensions();
        if width != height {
            return Err(AssetError::CubemapFaceNotSquare { face, width, height });
        }
        match size {
            None => size = Some(width),
            Some(expected) if expected != width => {
                return Err(AssetError::CubemapFaceMismatch {
                    face,
                    got: width,
                    expected,
                })
            }
            Some(_) => {}
        }
    }
    Ok(CubemapFaces {
        size: size.unwrap_or(0),
        faces,
    })
}

pub fn decode_cubemap(paths: &[PathBuf; 6]) -> Result<CubemapFaces, AssetError> {
    let faces = paths
        .iter()
        .map(|p| decode_image(p))
        .collect::<Result<Vec<_>, _>>()?;
    check_cubemap_faces(faces)
}

pub fn spawn_panorama_load(path: PathBuf, tx: Sender<LoadedAsset>) {
    thread::spawn(move || {
        log::info!("loading panorama {:?} in background", path);
        let asset = match decode_image(&path) {
            Ok(rgba) => LoadedAsset::Panorama(pad_to_equirect(rgba)),
            Err(error) => {
                log::error!("{}", error);
                LoadedAsset::Failed {
                    kind: AssetKind::Panorama,
                    error,
                }
            }
        };
        send_or_log(&tx, asset);
    });
}

pub fn spawn_cubemap_load(paths: [PathBuf; 6], tx: Sender<LoadedAsset>) {
    thread::spawn(move || {
        let asset = match decode_cubemap(&paths) {
            Ok(faces) => LoadedAsset::Cubemap(faces),
            Err(error) => {
                log::error!("{}", error);
                LoadedAsset::Failed {
                    kind: AssetKind::Cubemap,
                    error,
                }
            }
        };
        send_or_log(&tx, asset);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_images_are_padded_on_top() {
        let img = RgbaImage::from_pixel(8, 2, Rgba([255, 255, 255, 255]));
        let padded = pad_to_equirect(img);
        assert_eq!(padded.dimensions(), (8, 4));
        assert_eq!(padded.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(padded.get_pixel(0, 3), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn equirect_images_are_untouched() {
        let img = RgbaImage::new(8, 4);
        assert_eq!(pad_to_equirect(img).dimensions(), (8, 4));
    }

    #[test]
    fn cubemap_faces_must_agree() {
        let ok = check_cubemap_faces(vec![RgbaImage::new(4, 4); 6]).unwrap();
        assert_eq!(ok.size, 4);
        assert_eq!(ok.faces.len(), 6);

        let mut faces = vec![RgbaImage::new(4, 4); 6];
        faces[3] = RgbaImage::new(8, 8);
        assert!(matches!(
            check_cubemap_faces(faces),
            Err(AssetError::CubemapFaceMismatch { face: 3, got: 8, expected: 4 })
        ));

        let mut faces = vec![RgbaImage::new(4, 4); 6];
        faces[0] = RgbaImage::new(4, 2);
        assert!(matches!(
            check_cubemap_faces(faces),
            Err(AssetError::CubemapFaceNotSquare { face: 0, .. })
        ));
    }

    #[test]
    fn failed_panorama_load_is_sent_back() {
        let (tx, rx) = std::sync::mpsc::channel();
        spawn_panorama_load(PathBuf::from("no/such/room360.jpg"), tx);
        let asset = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        match asset {
            LoadedAsset::Failed { kind, error } => {
                assert_eq!(kind, AssetKind::Panorama);
                assert!(matches!(error, AssetError::Io { .. }));
                assert!(error.to_string().contains("room360.jpg"));
            }
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[test]
    fn failed_cubemap_load_is_sent_back() {
        let (tx, rx) = std::sync::mpsc::channel();
        let faces = crate::config::CUBEMAP_FACE_FILES.map(|f| PathBuf::from("no/such/sky").join(f));
        spawn_cubemap_load(faces, tx);
        let asset = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        assert!(matches!(
            asset,
            LoadedAsset::Failed {
                kind: AssetKind::Cubemap,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = decode_image(Path::new("no/such/pano.jpg")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(err.to_string().contains("pano.jpg"));
    }
}
