//! Writing generated outputs to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::{ImageData, OutputKind};

/// `<kind>.<ext>`, e.g. `normal.png`.
pub fn output_file_name(kind: OutputKind, image: &ImageData) -> String {
    format!("{}.{}", kind, image.extension())
}

/// Decode and write one output into `dir`.
pub fn save_output(dir: &Path, kind: OutputKind, image: &ImageData) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let bytes = image
        .decode()
        .with_context(|| format!("decode {kind} image"))?;
    let path = dir.join(output_file_name(kind, image));
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    tracing::debug!(%kind, path = %path.display(), "output saved");
    Ok(path)
}

/// Write every populated output. Paths come back in [`OutputKind::ALL`] order.
pub fn save_all(dir: &Path, results: &BTreeMap<OutputKind, ImageData>) -> Result<Vec<PathBuf>> {
    OutputKind::ALL
        .into_iter()
        .filter_map(|kind| results.get(&kind).map(|img| (kind, img)))
        .map(|(kind, img)| save_output(dir, kind, img))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_all_skips_missing_kinds() {
        let dir = tempdir().unwrap();
        let mut results = BTreeMap::new();
        results.insert(OutputKind::Albedo, ImageData::from_bytes("image/png", b"base"));
        results.insert(OutputKind::Ao, ImageData::from_bytes("image/jpeg", b"ao"));

        let paths = save_all(dir.path(), &results).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("albedo.png"), dir.path().join("ao.jpg")]
        );
        assert_eq!(std::fs::read(dir.path().join("ao.jpg")).unwrap(), b"ao");
        assert!(!dir.path().join("normal.png").exists());
    }

    #[test]
    fn save_output_rejects_bad_payload() {
        let dir = tempdir().unwrap();
        let img = ImageData::new("image/png", "not base64 !!");
        assert!(save_output(dir.path(), OutputKind::Height, &img).is_err());
    }
}
