use dialogue_net::schema::network::{NetworkError, NetworkSystem};
use std::path::{Path, PathBuf};

/// Load and merge every network file given, descending into directories.
/// Later files replace networks of the same name.
pub fn load_networks(paths: &[PathBuf]) -> Result<NetworkSystem, NetworkError> {
    let mut system = NetworkSystem::default();
    for path in paths {
        load_recursive(path, &mut system)?;
    }
    Ok(system)
}

fn load_recursive(path: &Path, system: &mut NetworkSystem) -> Result<(), NetworkError> {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        // Directory order is not stable across platforms.
        entries.sort();
        for entry in entries {
            if entry.is_dir() || entry.extension().and_then(|s| s.to_str()) == Some("ron") {
                load_recursive(&entry, system)?;
            }
        }
        Ok(())
    } else {
        system.merge(NetworkSystem::load_from_ron(path)?);
        Ok(())
    }
}
