//! TMX map decoder

use crate::color::Color;
use crate::data;
use crate::error::{Error, Result};
use crate::map::{
    self, Compression, DataEncoding, ExternalTileset, Image, ImageTileset, Layer, Map, MapObject,
    ObjectLayer, Properties, TileLayer, Tileset, FORMAT_VERSION,
};
use crate::markup::{self, AttributeReader, Element, ParseConfig};
use crate::resolver::{resolve_source, FileResolver, TilesetResolver};
use std::path::Path;

/// Decodes TMX documents into [`Map`]s
pub struct Decoder<R = FileResolver> {
    config: ParseConfig,
    resolver: R,
}

impl Decoder<FileResolver> {
    /// Create a decoder with default parse options, reading external
    /// tilesets from disk
    pub fn new() -> Self {
        Self::with_config(ParseConfig::default())
    }

    /// Create a decoder with explicit parse options
    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            resolver: FileResolver::new(config.clone()),
            config,
        }
    }
}

impl Default for Decoder<FileResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TilesetResolver> Decoder<R> {
    /// Use a different resolver for external tilesets
    pub fn with_resolver<S: TilesetResolver>(self, resolver: S) -> Decoder<S> {
        Decoder {
            config: self.config,
            resolver,
        }
    }

    /// Decode a map from TMX text
    ///
    /// `base` is the directory relative tileset references are resolved
    /// against.
    pub fn decode(&self, input: &str, base: Option<&Path>) -> Result<Map> {
        let root = markup::parse(input, &self.config)?;
        self.decode_element(&root, base)
    }

    /// Decode a map from a TMX file, resolving references next to it
    pub fn open(&self, path: &Path) -> Result<Map> {
        let text = read_file(path)?;
        self.decode(&text, path.parent())
    }

    /// Decode a standalone tileset from TSX text
    pub fn decode_tileset(&self, input: &str) -> Result<ImageTileset> {
        let root = markup::parse(input, &self.config)?;
        read_tileset_file(&root)
    }

    /// Decode a standalone tileset file
    pub fn open_tileset(&self, path: &Path) -> Result<ImageTileset> {
        self.decode_tileset(&read_file(path)?)
    }

    /// Decode a map from an already parsed `<map>` element
    pub fn decode_element(&self, root: &Element, base: Option<&Path>) -> Result<Map> {
        root.expect_tag("map")?;

        let mut attrs = root.attribute_reader();
        match attrs.optional_str("version") {
            Some(FORMAT_VERSION) => {}
            other => return Err(Error::Version(other.map(str::to_string))),
        }
        let size = (attrs.required("width")?, attrs.required("height")?);
        let tile_size = (attrs.required("tilewidth")?, attrs.required("tileheight")?);
        let orientation = attrs.required_str("orientation")?.to_string();
        attrs.finish()?;

        let mut map = Map {
            orientation,
            ..Map::new(size, tile_size)
        };

        for child in &root.children {
            match child.tag.as_str() {
                "properties" => map.properties.extend(read_properties(child)?),
                "tileset" => {
                    let (tileset, declared) = self.read_tileset(child, base)?;
                    map.tilesets.push(tileset);
                    check_first_gid(&map, declared)?;
                }
                "layer" => {
                    let layer = read_tile_layer(child, map.size)?;
                    log::trace!("Decoded tile layer '{}'", layer.name);
                    map.layers.push(Layer::Tiles(layer));
                }
                "objectgroup" => {
                    let layer = read_object_layer(child, &map)?;
                    log::trace!(
                        "Decoded object layer '{}' with {} objects",
                        layer.name,
                        layer.objects.len()
                    );
                    map.layers.push(Layer::Objects(layer));
                }
                other => return Err(Error::unknown_element("map", other)),
            }
        }

        log::debug!(
            "Decoded {}x{} {} map: {} tilesets, {} layers",
            map.width(),
            map.height(),
            map.orientation,
            map.tilesets.len(),
            map.layers.len()
        );
        Ok(map)
    }

    /// Read a `<tileset>` inside a map, returning it with its declared first GID
    fn read_tileset(&self, elem: &Element, base: Option<&Path>) -> Result<(Tileset, Option<u32>)> {
        let mut attrs = elem.attribute_reader();

        // An empty source is no reference at all
        if let Some(source) = attrs.optional_str("source").filter(|s| !s.is_empty()) {
            let first_gid = attrs.required("firstgid")?;
            attrs.finish()?;
            if let Some(child) = elem.children.first() {
                return Err(Error::unknown_element("tileset", &child.tag));
            }

            let path = resolve_source(source, base)?;
            let tileset = self.resolver.open_tileset(&path)?;
            let external = ExternalTileset {
                source: source.to_string(),
                tileset,
            };
            return Ok((Tileset::External(external), Some(first_gid)));
        }

        let first_gid = attrs.optional("firstgid")?;
        let tileset = read_image_tileset(elem, attrs)?;
        Ok((Tileset::Embedded(tileset), first_gid))
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Path {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// The last tileset pushed must start where its declaration says it does
fn check_first_gid(map: &Map, declared: Option<u32>) -> Result<()> {
    let index = map.tilesets.len() - 1;
    let computed = map.first_gid(index).unwrap_or_default();
    let declared = declared.unwrap_or(0);
    if declared == computed {
        Ok(())
    } else {
        Err(Error::FirstGidMismatch {
            tileset: map.tilesets[index].name().to_string(),
            declared,
            computed,
        })
    }
}

/// Read the root `<tileset>` of a standalone tileset file
pub(crate) fn read_tileset_file(root: &Element) -> Result<ImageTileset> {
    root.expect_tag("tileset")?;
    let mut attrs = root.attribute_reader();
    if attrs.optional_str("source").is_some_and(|s| !s.is_empty()) {
        return Err(Error::format(
            "tileset",
            "a tileset file cannot reference another tileset file",
        ));
    }
    // firstgid means nothing outside a map and is ignored here
    let _: Option<u32> = attrs.optional("firstgid")?;
    read_image_tileset(root, attrs)
}

/// Read an embedded tileset; `attrs` may already have consumed
/// reference-related attributes
fn read_image_tileset(elem: &Element, mut attrs: AttributeReader<'_>) -> Result<ImageTileset> {
    let mut tileset = ImageTileset {
        name: attrs.required_str("name")?.to_string(),
        tile_size: (attrs.required("tilewidth")?, attrs.required("tileheight")?),
        margin: attrs.optional("margin")?.unwrap_or(0),
        spacing: attrs.optional("spacing")?.unwrap_or(0),
        declared_tile_count: attrs.optional("tilecount")?,
        ..Default::default()
    };
    attrs.finish()?;

    for child in &elem.children {
        match child.tag.as_str() {
            "image" => {
                if tileset.image.is_some() {
                    return Err(Error::format("tileset", "more than one <image>"));
                }
                tileset.image = Some(read_image(child)?);
            }
            "tile" => {
                let (id, properties) = read_tile(child)?;
                if !properties.is_empty() {
                    tileset.tile_properties.entry(id).or_default().extend(properties);
                }
            }
            "properties" => tileset.properties.extend(read_properties(child)?),
            other => return Err(Error::unknown_element("tileset", other)),
        }
    }

    log::debug!(
        "Decoded tileset '{}' ({} tiles)",
        tileset.name,
        tileset.tile_count()
    );
    Ok(tileset)
}

fn read_tile(elem: &Element) -> Result<(u32, Properties)> {
    let mut attrs = elem.attribute_reader();
    let id = attrs.required("id")?;
    attrs.finish()?;

    let mut properties = Properties::new();
    for child in &elem.children {
        match child.tag.as_str() {
            "properties" => properties.extend(read_properties(child)?),
            other => return Err(Error::unknown_element("tile", other)),
        }
    }
    Ok((id, properties))
}

fn read_image(elem: &Element) -> Result<Image> {
    let mut attrs = elem.attribute_reader();
    let transparent_color = match attrs.optional_str("trans") {
        Some(trans) if !trans.is_empty() => Some(trans.parse::<Color>()?),
        _ => None,
    };
    let image = Image {
        source: attrs.required_str("source")?.to_string(),
        size: (
            attrs.optional("width")?.unwrap_or(0),
            attrs.optional("height")?.unwrap_or(0),
        ),
        transparent_color,
    };
    attrs.finish()?;

    if let Some(child) = elem.children.first() {
        return Err(Error::unknown_element("image", &child.tag));
    }
    Ok(image)
}

/// Read a `<properties>` element into a bag
pub(crate) fn read_properties(elem: &Element) -> Result<Properties> {
    elem.expect_tag("properties")?;
    elem.attribute_reader().finish()?;

    let mut properties = Properties::new();
    for child in &elem.children {
        if child.tag != "property" {
            return Err(Error::format(
                "properties",
                format!("unexpected <{}>, only <property> is allowed", child.tag),
            ));
        }
        if !child.children.is_empty() {
            return Err(Error::format("property", "unexpected child elements"));
        }
        let mut attrs = child.attribute_reader();
        let name = attrs.required_str("name")?;
        let value = attrs.required_str("value")?;
        attrs.finish()?;
        properties.insert(name.to_string(), value.to_string());
    }
    Ok(properties)
}

/// Attributes shared by `<layer>` and `<objectgroup>`
struct LayerHeader {
    name: String,
    opacity: f32,
    visible: bool,
}

fn read_layer_header(elem: &Element, map_size: (u32, u32)) -> Result<LayerHeader> {
    let mut attrs = elem.attribute_reader();
    let name = attrs.required_str("name")?.to_string();
    let opacity = attrs.optional::<f32>("opacity")?.unwrap_or(1.0);
    let visible = attrs.optional::<i64>("visible")?.map_or(true, |v| v != 0);
    let size: (u32, u32) = (attrs.required("width")?, attrs.required("height")?);
    attrs.finish()?;

    if size != map_size {
        return Err(Error::LayerSizeMismatch {
            layer: name,
            expected: map_size,
            found: size,
        });
    }
    Ok(LayerHeader {
        name,
        opacity,
        visible,
    })
}

fn read_tile_layer(elem: &Element, map_size: (u32, u32)) -> Result<TileLayer> {
    let header = read_layer_header(elem, map_size)?;
    let cells = map::cell_count(map_size);

    let mut properties = Properties::new();
    let mut data = None;
    for child in &elem.children {
        match child.tag.as_str() {
            "properties" => properties.extend(read_properties(child)?),
            "data" => {
                if data.is_some() {
                    return Err(Error::format("layer", "more than one <data>"));
                }
                data = Some(read_data(child, cells)?);
            }
            other => return Err(Error::unknown_element("layer", other)),
        }
    }
    let (data, encoding, compression) =
        data.ok_or_else(|| Error::format("layer", "missing <data>"))?;

    Ok(TileLayer {
        name: header.name,
        opacity: header.opacity,
        visible: header.visible,
        data,
        encoding,
        compression,
        properties,
    })
}

fn read_data(elem: &Element, cells: usize) -> Result<(Vec<u32>, DataEncoding, Compression)> {
    let mut attrs = elem.attribute_reader();
    let encoding: DataEncoding = attrs.required_str("encoding")?.parse()?;
    let compression = Compression::from_attribute(attrs.optional_str("compression"))?;
    attrs.finish()?;

    if let Some(child) = elem.children.first() {
        return Err(Error::unknown_element("data", &child.tag));
    }

    let text = elem.text.as_deref().unwrap_or_default();
    let gids = data::decode_tiles(text, compression, encoding, cells)?;
    Ok((gids, encoding, compression))
}

fn read_object_layer(elem: &Element, map: &Map) -> Result<ObjectLayer> {
    let header = read_layer_header(elem, map.size)?;

    let mut layer = ObjectLayer {
        name: header.name,
        opacity: header.opacity,
        visible: header.visible,
        properties: Properties::new(),
        objects: Vec::new(),
    };
    for child in &elem.children {
        match child.tag.as_str() {
            "properties" => layer.properties.extend(read_properties(child)?),
            "object" => layer.objects.push(read_object(child, map)?),
            other => return Err(Error::unknown_element("objectgroup", other)),
        }
    }
    Ok(layer)
}

fn read_object(elem: &Element, map: &Map) -> Result<MapObject> {
    let mut attrs = elem.attribute_reader();
    let position = (attrs.required("x")?, attrs.required("y")?);
    let gid = attrs.optional::<u32>("gid")?.filter(|&gid| gid != 0);
    let name = attrs.optional_str("name").map(str::to_string);
    let object_type = attrs.optional_str("type").map(str::to_string);
    let size = match (attrs.optional("width")?, attrs.optional("height")?) {
        (Some(width), Some(height)) => (width, height),
        // A tile object without explicit size takes its tile's size
        (None, None) => gid
            .and_then(|gid| map.tile_size_of_gid(gid))
            .unwrap_or((0, 0)),
        _ => {
            return Err(Error::format(
                "object",
                "width and height must be given together",
            ))
        }
    };
    attrs.finish()?;

    if let Some(child) = elem.children.first() {
        return Err(Error::unknown_element("object", &child.tag));
    }

    Ok(MapObject {
        position,
        size,
        gid,
        name,
        object_type,
    })
}
