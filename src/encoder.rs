//! TMX map encoder

use crate::data;
use crate::error::{Error, Result};
use crate::map::{
    Image, ImageTileset, Layer, Map, MapObject, ObjectLayer, Properties, TileLayer, Tileset,
    FORMAT_VERSION, GID_SIZE,
};
use crate::markup::{self, Element};
use std::path::Path;

/// Encodes [`Map`]s into TMX text
pub struct Encoder {
    indent: usize,
}

impl Encoder {
    /// Create a new encoder (one-space indentation)
    pub fn new() -> Self {
        Self { indent: 1 }
    }

    /// Set the number of spaces per nesting level
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Encode a map to a TMX document string
    pub fn encode(&self, map: &Map) -> Result<String> {
        let root = self.encode_element(map)?;
        markup::to_xml_string(&root, self.indent)
    }

    /// Encode a map to a `<map>` element
    pub fn encode_element(&self, map: &Map) -> Result<Element> {
        let mut root = Element::new("map")
            .with_attribute("version", FORMAT_VERSION)
            .with_attribute("orientation", &map.orientation)
            .with_attribute("width", map.width())
            .with_attribute("height", map.height())
            .with_attribute("tilewidth", map.tile_size.0)
            .with_attribute("tileheight", map.tile_size.1);

        append_properties(&mut root, &map.properties);

        for (tileset, first_gid) in map.tilesets.iter().zip(map.first_gids()) {
            root.push(write_tileset(tileset, first_gid));
        }

        for layer in &map.layers {
            let element = match layer {
                Layer::Tiles(layer) => write_tile_layer(layer, map)?,
                Layer::Objects(layer) => write_object_layer(layer, map),
            };
            root.push(element);
        }

        log::debug!(
            "Encoded {}x{} map: {} tilesets, {} layers",
            map.width(),
            map.height(),
            map.tilesets.len(),
            map.layers.len()
        );
        Ok(root)
    }

    /// Encode a map and write it to a file
    pub fn save(&self, map: &Map, path: &Path) -> Result<()> {
        let encoded = self.encode(map)?;
        write_file(path, &encoded)
    }

    /// Encode a standalone tileset document (no `firstgid`)
    pub fn encode_tileset(&self, tileset: &ImageTileset) -> Result<String> {
        markup::to_xml_string(&write_image_tileset(tileset, 0), self.indent)
    }

    /// Encode a standalone tileset and write it to a file
    pub fn save_tileset(&self, tileset: &ImageTileset, path: &Path) -> Result<()> {
        let encoded = self.encode_tileset(tileset)?;
        write_file(path, &encoded)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::Path {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Append a `<properties>` child, or nothing for an empty bag
fn append_properties(parent: &mut Element, properties: &Properties) {
    if properties.is_empty() {
        return;
    }
    let mut element = Element::new("properties");
    for (name, value) in properties {
        element.push(
            Element::new("property")
                .with_attribute("name", name)
                .with_attribute("value", value),
        );
    }
    parent.push(element);
}

/// `first_gid` of 0 means the tileset is not bound to a map
fn write_tileset(tileset: &Tileset, first_gid: u32) -> Element {
    match tileset {
        Tileset::Embedded(tileset) => write_image_tileset(tileset, first_gid),
        Tileset::External(external) => {
            let mut element = Element::new("tileset");
            if first_gid != 0 {
                element.set_attribute("firstgid", first_gid);
            }
            element.with_attribute("source", &external.source)
        }
    }
}

fn write_image_tileset(tileset: &ImageTileset, first_gid: u32) -> Element {
    let mut element = Element::new("tileset");
    if first_gid != 0 {
        element.set_attribute("firstgid", first_gid);
    }
    element.set_attribute("name", &tileset.name);
    element.set_attribute("tilewidth", tileset.tile_size.0);
    element.set_attribute("tileheight", tileset.tile_size.1);
    if tileset.spacing != 0 {
        element.set_attribute("spacing", tileset.spacing);
    }
    if tileset.margin != 0 {
        element.set_attribute("margin", tileset.margin);
    }
    if let Some(count) = tileset.declared_tile_count {
        element.set_attribute("tilecount", count);
    }

    append_properties(&mut element, &tileset.properties);

    if let Some(image) = &tileset.image {
        element.push(write_image(image));
    }

    // BTreeMap iteration keeps tiles in ascending id order
    for (id, properties) in &tileset.tile_properties {
        if properties.is_empty() {
            continue;
        }
        let mut tile = Element::new("tile").with_attribute("id", id);
        append_properties(&mut tile, properties);
        element.push(tile);
    }

    element
}

fn write_image(image: &Image) -> Element {
    let mut element = Element::new("image").with_attribute("source", &image.source);
    if let Some(color) = image.transparent_color {
        element.set_attribute("trans", color);
    }
    if image.size.0 != 0 {
        element.set_attribute("width", image.size.0);
    }
    if image.size.1 != 0 {
        element.set_attribute("height", image.size.1);
    }
    element
}

fn write_layer_header(tag: &str, name: &str, opacity: f32, visible: bool, map: &Map) -> Element {
    let mut element = Element::new(tag)
        .with_attribute("name", name)
        .with_attribute("width", map.width())
        .with_attribute("height", map.height());
    if !visible {
        element.set_attribute("visible", 0);
    }
    if opacity != 1.0 {
        element.set_attribute("opacity", opacity);
    }
    element
}

fn write_tile_layer(layer: &TileLayer, map: &Map) -> Result<Element> {
    if layer.data.len() != map.cell_count() {
        return Err(Error::DataLength {
            expected: map.cell_count().saturating_mul(GID_SIZE),
            actual: layer.data.len().saturating_mul(GID_SIZE),
        });
    }

    let mut element = write_layer_header("layer", &layer.name, layer.opacity, layer.visible, map);
    append_properties(&mut element, &layer.properties);

    let text = data::encode_tiles(&layer.data, layer.compression, layer.encoding)?;
    let mut data = Element::new("data").with_attribute("encoding", layer.encoding);
    if let Some(compression) = layer.compression.attribute_value() {
        data.set_attribute("compression", compression);
    }
    element.push(data.with_text(text));

    log::trace!("Encoded tile layer '{}'", layer.name);
    Ok(element)
}

fn write_object_layer(layer: &ObjectLayer, map: &Map) -> Element {
    let mut element =
        write_layer_header("objectgroup", &layer.name, layer.opacity, layer.visible, map);
    append_properties(&mut element, &layer.properties);
    for object in &layer.objects {
        element.push(write_object(object, map));
    }
    log::trace!(
        "Encoded object layer '{}' with {} objects",
        layer.name,
        layer.objects.len()
    );
    element
}

fn write_object(object: &MapObject, map: &Map) -> Element {
    let mut element = Element::new("object");
    if let Some(name) = &object.name {
        element.set_attribute("name", name);
    }
    if let Some(object_type) = &object.object_type {
        element.set_attribute("type", object_type);
    }
    let gid = object.gid.filter(|&gid| gid != 0);
    if let Some(gid) = gid {
        element.set_attribute("gid", gid);
    }
    element.set_attribute("x", object.position.0);
    element.set_attribute("y", object.position.1);

    // Size is implied when it matches the referenced tile; an unresolvable
    // gid implies nothing
    let implied = gid.and_then(|gid| map.tile_size_of_gid(gid));
    if object.size != (0, 0) && implied != Some(object.size) {
        element.set_attribute("width", object.size.0);
        element.set_attribute("height", object.size.1);
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::map::{Compression, ExternalTileset};

    fn two_by_one() -> Map {
        let mut map = Map::new((2, 1), (8, 8));
        map.tilesets
            .push(ImageTileset::new("t", 8, 8).with_tile_count(2).into());
        map.layers.push(TileLayer::new("L", vec![1, 2]).into());
        map
    }

    fn find<'a>(parent: &'a Element, tag: &str) -> Vec<&'a Element> {
        parent.children.iter().filter(|c| c.tag == tag).collect()
    }

    #[test]
    fn test_encode_map_attributes() {
        let root = Encoder::new().encode_element(&two_by_one()).unwrap();
        assert_eq!(root.tag, "map");
        let names: Vec<&str> = root.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["version", "orientation", "width", "height", "tilewidth", "tileheight"]
        );
        assert_eq!(root.attribute("version"), Some("1.0"));
        assert_eq!(root.attribute("width"), Some("2"));
    }

    #[test]
    fn test_encode_document_text() {
        let text = Encoder::new().encode(&two_by_one()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<map "));
        assert!(text.contains("<tileset firstgid=\"1\" name=\"t\" tilewidth=\"8\" tileheight=\"8\" tilecount=\"2\"/>"));
        assert!(text.contains("<data encoding=\"base64\" compression=\"zlib\">"));
    }

    #[test]
    fn test_encode_order_preserved() {
        let mut map = two_by_one();
        map.layers.insert(0, ObjectLayer::new("first").into());
        map.layers.push(ObjectLayer::new("last").into());

        let root = Encoder::new().encode_element(&map).unwrap();
        let layer_names: Vec<&str> = root
            .children
            .iter()
            .filter(|c| c.tag == "layer" || c.tag == "objectgroup")
            .filter_map(|c| c.attribute("name"))
            .collect();
        assert_eq!(layer_names, vec!["first", "L", "last"]);
    }

    #[test]
    fn test_encode_no_empty_properties() {
        let mut map = two_by_one();
        let Tileset::Embedded(tileset) = &mut map.tilesets[0] else {
            unreachable!()
        };
        tileset.tile_properties.insert(1, Properties::new());

        let root = Encoder::new().encode_element(&map).unwrap();
        fn count(element: &Element) -> usize {
            let own = usize::from(element.tag == "properties" || element.tag == "tile");
            own + element.children.iter().map(count).sum::<usize>()
        }
        assert_eq!(count(&root), 0);
    }

    #[test]
    fn test_encode_tiles_in_ascending_order() {
        let mut tileset = ImageTileset::new("t", 8, 8);
        for id in [9, 2, 5] {
            tileset
                .tile_properties
                .insert(id, Properties::from([("k".to_string(), id.to_string())]));
        }
        let element = write_image_tileset(&tileset, 0);
        let ids: Vec<&str> = find(&element, "tile")
            .iter()
            .filter_map(|t| t.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["2", "5", "9"]);
        assert!(element.attribute("firstgid").is_none());
    }

    #[test]
    fn test_encode_tileset_defaults_omitted() {
        let plain = write_image_tileset(&ImageTileset::new("t", 8, 8), 3);
        assert!(plain.attribute("spacing").is_none());
        assert!(plain.attribute("margin").is_none());
        assert_eq!(plain.attribute("firstgid"), Some("3"));

        let spaced = ImageTileset {
            spacing: 1,
            margin: 2,
            ..ImageTileset::new("t", 8, 8)
        };
        let element = write_image_tileset(&spaced, 1);
        assert_eq!(element.attribute("spacing"), Some("1"));
        assert_eq!(element.attribute("margin"), Some("2"));
    }

    #[test]
    fn test_encode_external_tileset() {
        let external = Tileset::External(ExternalTileset {
            source: "tiles.tsx".to_string(),
            tileset: ImageTileset::new("t", 8, 8).with_tile_count(4),
        });
        let element = write_tileset(&external, 5);
        assert_eq!(
            element.attributes,
            vec![
                ("firstgid".to_string(), "5".to_string()),
                ("source".to_string(), "tiles.tsx".to_string()),
            ]
        );
        assert!(element.children.is_empty());
        assert!(write_tileset(&external, 0).attribute("firstgid").is_none());
    }

    #[test]
    fn test_encode_image() {
        let image = Image {
            source: "a.png".to_string(),
            size: (0, 16),
            transparent_color: Some(Color::new(255, 0, 255)),
        };
        let element = write_image(&image);
        assert_eq!(element.attribute("trans"), Some("ff00ff"));
        assert!(element.attribute("width").is_none());
        assert_eq!(element.attribute("height"), Some("16"));

        let bare = write_image(&Image::new("b.png"));
        assert_eq!(bare.attributes.len(), 1);
    }

    #[test]
    fn test_encode_layer_header() {
        let mut layer = TileLayer::new("L", vec![1, 2]);
        layer.visible = false;
        layer.opacity = 0.25;
        layer.compression = Compression::None;

        let element = write_tile_layer(&layer, &two_by_one()).unwrap();
        assert_eq!(element.attribute("visible"), Some("0"));
        assert_eq!(element.attribute("opacity"), Some("0.25"));
        let data = find(&element, "data")[0];
        assert!(data.attribute("compression").is_none());
        assert_eq!(data.text.as_deref(), Some("AQAAAAIAAAA="));

        let default = write_tile_layer(&TileLayer::new("L", vec![1, 2]), &two_by_one()).unwrap();
        assert!(default.attribute("visible").is_none());
        assert!(default.attribute("opacity").is_none());
    }

    #[test]
    fn test_encode_wrong_cell_count() {
        let layer = TileLayer::new("L", vec![1, 2, 3]);
        let err = write_tile_layer(&layer, &two_by_one()).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: 8, actual: 12 }));
    }

    #[test]
    fn test_encode_huge_map_cell_count() {
        let map = Map::new((u32::MAX, u32::MAX), (8, 8));
        let err = write_tile_layer(&TileLayer::new("L", vec![1]), &map).unwrap_err();
        assert!(matches!(err, Error::DataLength { actual: 4, .. }));
    }

    #[test]
    fn test_encode_object_size_deduplication() {
        let mut map = two_by_one();
        map.tilesets
            .push(ImageTileset::new("big", 16, 32).with_tile_count(1).into());

        // gid 3 is the first tile of "big" (16x32)
        let implied = write_object(&MapObject::new(1, 2).with_gid(3).with_size(16, 32), &map);
        assert!(implied.attribute("width").is_none());
        assert!(implied.attribute("height").is_none());
        assert_eq!(implied.attribute("gid"), Some("3"));

        let differing = write_object(&MapObject::new(1, 2).with_gid(3).with_size(8, 8), &map);
        assert_eq!(differing.attribute("width"), Some("8"));
        assert_eq!(differing.attribute("height"), Some("8"));

        let unresolvable = write_object(&MapObject::new(1, 2).with_gid(99).with_size(16, 32), &map);
        assert_eq!(unresolvable.attribute("width"), Some("16"));

        let no_size = write_object(&MapObject::new(-1, 2), &map);
        assert_eq!(
            no_size.attributes,
            vec![
                ("x".to_string(), "-1".to_string()),
                ("y".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_encode_object_optional_fields() {
        let object = MapObject {
            name: Some("door".to_string()),
            object_type: Some("exit".to_string()),
            gid: Some(0),
            ..MapObject::new(0, 0)
        };
        let element = write_object(&object, &two_by_one());
        assert_eq!(element.attribute("name"), Some("door"));
        assert_eq!(element.attribute("type"), Some("exit"));
        assert!(element.attribute("gid").is_none());
    }

    #[test]
    fn test_save_and_encode_tileset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tsx");
        let tileset = ImageTileset::new("t", 8, 8).with_image(Image::new("t.png").with_size(16, 8));

        Encoder::new().save_tileset(&tileset, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<tileset name=\"t\""));
        assert!(!text.contains("firstgid"));
        assert!(text.contains("<image source=\"t.png\" width=\"16\" height=\"8\"/>"));
    }
}
