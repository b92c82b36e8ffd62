//! External tileset resolution

use crate::decoder::read_tileset_file;
use crate::error::{Error, Result};
use crate::map::ImageTileset;
use crate::markup::{self, ParseConfig};
use std::path::{Path, PathBuf};

/// Opens tilesets referenced by `<tileset source="...">`
pub trait TilesetResolver {
    /// Load the tileset stored at `path`
    ///
    /// `path` has already been joined onto the referencing document's base
    /// directory.
    fn open_tileset(&self, path: &Path) -> Result<ImageTileset>;
}

/// Combine a `source` reference with the referencing document's directory
///
/// Relative references need a base directory; without one they cannot be
/// resolved.
pub fn resolve_source(source: &str, base: Option<&Path>) -> Result<PathBuf> {
    let path = Path::new(source);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match base {
        Some(base) => Ok(base.join(path)),
        None => Err(Error::Path {
            path: path.to_path_buf(),
            message: "relative tileset reference without a base directory".to_string(),
        }),
    }
}

/// Reads standalone tileset files from disk
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    config: ParseConfig,
}

impl FileResolver {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }
}

impl TilesetResolver for FileResolver {
    fn open_tileset(&self, path: &Path) -> Result<ImageTileset> {
        log::debug!("Opening external tileset {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::Path {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let root = markup::parse(&text, &self.config)?;
        read_tileset_file(&root)
    }
}
