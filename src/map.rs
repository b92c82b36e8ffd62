//! Tile map data structures

use crate::color::Color;
use crate::error::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// TMX format constants
pub const FORMAT_VERSION: &str = "1.0";
pub const BASE64_ENCODING: &str = "base64";
pub const ZLIB_COMPRESSION: &str = "zlib";
pub const GZIP_COMPRESSION: &str = "gzip";
/// Bytes per packed tile ID (u32, little-endian)
pub const GID_SIZE: usize = 4;

/// String-to-string property bag
pub type Properties = BTreeMap<String, String>;

/// Cells in a grid of `size`, saturating where `usize` is too narrow
pub fn cell_count(size: (u32, u32)) -> usize {
    (size.0 as usize).saturating_mul(size.1 as usize)
}

/// Text-safe transport encoding for tile layer data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataEncoding {
    #[default]
    Base64,
}

impl DataEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEncoding::Base64 => BASE64_ENCODING,
        }
    }
}

impl FromStr for DataEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            BASE64_ENCODING => Ok(DataEncoding::Base64),
            other => Err(Error::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression applied to packed tile data before transport encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    None,
    /// New layers are written zlib-compressed unless told otherwise
    #[default]
    Zlib,
    Gzip,
}

impl Compression {
    pub const ALL: [Compression; 3] = [Compression::None, Compression::Zlib, Compression::Gzip];

    /// Attribute value, or `None` when no `compression` attribute is written
    pub fn attribute_value(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Zlib => Some(ZLIB_COMPRESSION),
            Compression::Gzip => Some(GZIP_COMPRESSION),
        }
    }

    /// Interpret an optional `compression` attribute
    ///
    /// Uncompressed data is marked by the attribute's absence, so only
    /// `zlib` and `gzip` are accepted as values.
    pub fn from_attribute(value: Option<&str>) -> Result<Self, Error> {
        match value {
            None => Ok(Compression::None),
            Some(ZLIB_COMPRESSION) => Ok(Compression::Zlib),
            Some(GZIP_COMPRESSION) => Ok(Compression::Gzip),
            Some(other) => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            ZLIB_COMPRESSION => Ok(Compression::Zlib),
            GZIP_COMPRESSION => Ok(Compression::Gzip),
            other => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_value().unwrap_or("none"))
    }
}

/// An image referenced by a tileset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
    /// Path as written in the document
    pub source: String,
    /// Pixel size, `(0, 0)` when unknown
    pub size: (u32, u32),
    /// Color treated as transparent
    pub transparent_color: Option<Color>,
}

impl Image {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

/// A tileset defined inline (or loaded from a standalone tileset file)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageTileset {
    pub name: String,
    pub tile_size: (u32, u32),
    pub margin: u32,
    pub spacing: u32,
    /// Explicit tile count (`tilecount` attribute), overrides the image-derived count
    pub declared_tile_count: Option<u32>,
    pub image: Option<Image>,
    pub properties: Properties,
    /// Per-tile property overrides, keyed by local tile index
    pub tile_properties: BTreeMap<u32, Properties>,
}

impl ImageTileset {
    pub fn new(name: impl Into<String>, tile_width: u32, tile_height: u32) -> Self {
        Self {
            name: name.into(),
            tile_size: (tile_width, tile_height),
            ..Default::default()
        }
    }

    pub fn with_tile_count(mut self, count: u32) -> Self {
        self.declared_tile_count = Some(count);
        self
    }

    pub fn with_image(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }

    /// Number of tiles, from `tilecount` or else from the image grid
    pub fn tile_count(&self) -> u32 {
        if let Some(count) = self.declared_tile_count {
            return count;
        }
        let Some(image) = &self.image else {
            return 0;
        };
        let spacing = u64::from(self.spacing);
        let margin = u64::from(self.margin);
        let axis = |image_len: u32, tile_len: u32| {
            let step = u64::from(tile_len) + spacing;
            if step == 0 {
                return 0;
            }
            (u64::from(image_len) + spacing).saturating_sub(2 * margin) / step
        };
        let count = axis(image.size.0, self.tile_size.0)
            .saturating_mul(axis(image.size.1, self.tile_size.1));
        // Grids too large for a GID range clamp to the whole range
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// A tileset loaded by reference from another file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTileset {
    /// Reference path exactly as written in the document
    pub source: String,
    /// The referenced tileset's content
    pub tileset: ImageTileset,
}

/// A tileset attached to a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tileset {
    Embedded(ImageTileset),
    External(ExternalTileset),
}

impl Tileset {
    /// Tileset content, whether embedded or loaded by reference
    pub fn content(&self) -> &ImageTileset {
        match self {
            Tileset::Embedded(tileset) => tileset,
            Tileset::External(external) => &external.tileset,
        }
    }

    pub fn name(&self) -> &str {
        &self.content().name
    }

    pub fn tile_count(&self) -> u32 {
        self.content().tile_count()
    }

    pub fn tile_size(&self) -> (u32, u32) {
        self.content().tile_size
    }
}

impl From<ImageTileset> for Tileset {
    fn from(tileset: ImageTileset) -> Self {
        Tileset::Embedded(tileset)
    }
}

/// A placed object inside an object layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapObject {
    pub position: (i32, i32),
    /// `(0, 0)` when the object has no explicit size
    pub size: (u32, u32),
    pub gid: Option<u32>,
    pub name: Option<String>,
    pub object_type: Option<String>,
}

impl MapObject {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            position: (x, y),
            ..Default::default()
        }
    }

    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

/// A grid of global tile IDs
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub opacity: f32,
    pub visible: bool,
    /// Row-major global tile IDs, one per map cell (0 = empty)
    pub data: Vec<u32>,
    pub encoding: DataEncoding,
    pub compression: Compression,
    pub properties: Properties,
}

impl TileLayer {
    pub fn new(name: impl Into<String>, data: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            opacity: 1.0,
            visible: true,
            data,
            encoding: DataEncoding::default(),
            compression: Compression::default(),
            properties: Properties::new(),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Global tile ID at a cell, given the owning map's width
    pub fn tile_at(&self, x: u32, y: u32, map_width: u32) -> Option<u32> {
        if x >= map_width {
            return None;
        }
        let index = (y as usize)
            .checked_mul(map_width as usize)?
            .checked_add(x as usize)?;
        self.data.get(index).copied()
    }
}

/// A free-form list of placed objects
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayer {
    pub name: String,
    pub opacity: f32,
    pub visible: bool,
    pub properties: Properties,
    pub objects: Vec<MapObject>,
}

impl ObjectLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opacity: 1.0,
            visible: true,
            properties: Properties::new(),
            objects: Vec::new(),
        }
    }
}

/// A map layer
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Tiles(TileLayer),
    Objects(ObjectLayer),
}

impl Layer {
    pub fn name(&self) -> &str {
        match self {
            Layer::Tiles(layer) => &layer.name,
            Layer::Objects(layer) => &layer.name,
        }
    }
}

impl From<TileLayer> for Layer {
    fn from(layer: TileLayer) -> Self {
        Layer::Tiles(layer)
    }
}

impl From<ObjectLayer> for Layer {
    fn from(layer: ObjectLayer) -> Self {
        Layer::Objects(layer)
    }
}

/// A TMX map document
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    /// Size in tiles
    pub size: (u32, u32),
    /// Tile size in pixels
    pub tile_size: (u32, u32),
    /// Orientation name, stored verbatim (orthogonal, isometric, ...)
    pub orientation: String,
    pub properties: Properties,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
}

impl Map {
    /// Create an empty orthogonal map
    pub fn new(size: (u32, u32), tile_size: (u32, u32)) -> Self {
        Self {
            size,
            tile_size,
            orientation: "orthogonal".to_string(),
            properties: Properties::new(),
            tilesets: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    /// Number of cells in every tile layer
    pub fn cell_count(&self) -> usize {
        cell_count(self.size)
    }

    /// First global tile ID of every tileset, in document order
    ///
    /// The first tileset starts at 1; each following one starts after the
    /// tiles of all tilesets before it.
    pub fn first_gids(&self) -> Vec<u32> {
        let mut next = 1u32;
        self.tilesets
            .iter()
            .map(|tileset| {
                let first = next;
                next = next.saturating_add(tileset.tile_count());
                first
            })
            .collect()
    }

    /// First global tile ID of the tileset at `index`
    pub fn first_gid(&self, index: usize) -> Option<u32> {
        self.first_gids().get(index).copied()
    }

    /// The tileset containing `gid`, with the tile's local index
    pub fn tileset_for_gid(&self, gid: u32) -> Option<(&Tileset, u32)> {
        if gid == 0 {
            return None;
        }
        self.tilesets
            .iter()
            .zip(self.first_gids())
            .find(|(tileset, first)| gid >= *first && gid - first < tileset.tile_count())
            .map(|(tileset, first)| (tileset, gid - first))
    }

    /// Pixel size of the tile referenced by `gid`, when it can be resolved
    pub fn tile_size_of_gid(&self, gid: u32) -> Option<(u32, u32)> {
        self.tileset_for_gid(gid).map(|(tileset, _)| tileset.tile_size())
    }
}
