use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use georef_core::GroundControlPoint;
use georef_warp::FittedTransform;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GeoreferenceArtifact;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("invalid image id {0:?}: only alphanumerics, '-', '_' and '.' are allowed")]
    InvalidImageId(String),
    #[error("side-car io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("side-car serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted result of one georeferencing run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    pub transform: FittedTransform,
    pub gcps: Vec<GroundControlPoint>,
    pub rms_m: f64,
}

impl SidecarRecord {
    pub fn from_artifact(artifact: &GeoreferenceArtifact, gcps: &[GroundControlPoint]) -> Self {
        Self {
            transform: artifact.fitted,
            gcps: gcps.to_vec(),
            rms_m: artifact.residuals.rms_m,
        }
    }
}

/// Durable JSON store of fitted transforms, one file per source image id.
///
/// Writes go through a temporary file in the same directory followed by a
/// rename, so a crash never leaves a half-written record behind.
pub struct SidecarStore {
    dir: PathBuf,
}

impl SidecarStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SidecarError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, image_id: &str) -> Result<PathBuf, SidecarError> {
        if image_id.is_empty()
            || !image_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || image_id.starts_with('.')
        {
            return Err(SidecarError::InvalidImageId(image_id.to_owned()));
        }
        Ok(self.dir.join(format!("{image_id}.georef.json")))
    }

    pub fn save(&self, image_id: &str, record: &SidecarRecord) -> Result<(), SidecarError> {
        let path = self.path_for(image_id)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&serde_json::to_vec_pretty(record)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("persisted side-car {}", path.display());
        Ok(())
    }

    /// Load a record; `Ok(None)` when none has been saved for this id.
    pub fn load(&self, image_id: &str) -> Result<Option<SidecarRecord>, SidecarError> {
        let path = self.path_for(image_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove(&self, image_id: &str) -> Result<bool, SidecarError> {
        let path = self.path_for(image_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_core::{AffineTransform, BoundingBox};

    fn record() -> SidecarRecord {
        let affine = AffineTransform::new([-90.10, 1e-5, 0.0], [35.00, 0.0, -1e-5]);
        SidecarRecord {
            transform: FittedTransform {
                affine,
                bounds: BoundingBox::new(35.00, 34.99, -90.09, -90.10),
            },
            gcps: vec![GroundControlPoint {
                id: 0,
                pixel_x: 10.0,
                pixel_y: 20.0,
                lat: 34.995,
                lon: -90.095,
            }],
            rms_m: 3.25,
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SidecarStore::open(dir.path()).expect("open");
        let rec = record();

        assert_eq!(store.load("frame-001").expect("load"), None);
        store.save("frame-001", &rec).expect("save");
        assert_eq!(store.load("frame-001").expect("load"), Some(rec));
        // No temp file is left behind.
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec!["frame-001.georef.json"]);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SidecarStore::open(dir.path()).expect("open");
        let mut rec = record();
        store.save("frame", &rec).expect("save");
        rec.rms_m = 9.0;
        store.save("frame", &rec).expect("save again");
        assert_eq!(store.load("frame").expect("load").map(|r| r.rms_m), Some(9.0));
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SidecarStore::open(dir.path()).expect("open");
        for id in ["../evil", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.save(id, &record()),
                Err(SidecarError::InvalidImageId(_))
            ));
        }
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SidecarStore::open(dir.path()).expect("open");
        store.save("x", &record()).expect("save");
        assert!(store.remove("x").expect("remove"));
        assert!(!store.remove("x").expect("second remove"));
    }
}
