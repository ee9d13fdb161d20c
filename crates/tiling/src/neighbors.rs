//! Neighbor tile lookup on disk

use crate::tile_name::NeighborSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths of the neighbors present in `dir`, in neighbor order.
///
/// Each candidate is checked once. A missing neighbor is not an error, and
/// an empty result means the tile is processed in isolation.
pub fn resolve(neighbors: &NeighborSet, dir: &Path) -> Vec<PathBuf> {
    neighbors
        .iter()
        .filter_map(|(direction, tile)| {
            let path = dir.join(tile.file_name());
            if path.is_file() {
                Some(path)
            } else {
                debug!("No {:?} neighbor at {}", direction, path.display());
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_name::TileId;
    use std::fs;

    #[test]
    fn test_resolve_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let tile = TileId::parse("Semis_2021_0770_6278_LA93_IGN69.laz").unwrap();
        fs::write(dir.path().join(tile.file_name()), b"").unwrap();
        fs::write(dir.path().join("Semis_2021_0771_6278_LA93_IGN69.laz"), b"").unwrap();
        fs::write(dir.path().join("Semis_2021_0769_6277_LA93_IGN69.laz"), b"").unwrap();
        // different extension is a different file
        fs::write(dir.path().join("Semis_2021_0770_6279_LA93_IGN69.las"), b"").unwrap();
        // a directory with a neighbor's name does not count
        fs::create_dir(dir.path().join("Semis_2021_0769_6279_LA93_IGN69.laz")).unwrap();

        let found = resolve(&tile.neighbors(), dir.path());
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "Semis_2021_0771_6278_LA93_IGN69.laz".to_string(),
                "Semis_2021_0769_6277_LA93_IGN69.laz".to_string(),
            ]
        );
        assert!(!found.contains(&dir.path().join(tile.file_name())));
    }

    #[test]
    fn test_resolve_isolated_tile() {
        let dir = tempfile::tempdir().unwrap();
        let tile = TileId::parse("Semis_2021_0001_0001_LA93_IGN69.laz").unwrap();
        assert!(resolve(&tile.neighbors(), dir.path()).is_empty());
        assert!(resolve(&tile.neighbors(), Path::new("/nonexistent/dir")).is_empty());
    }
}
