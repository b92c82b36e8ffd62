//! # emx-tmx
//!
//! Reading and writing TMX tile maps, the XML format used by the Tiled map
//! editor.
//!
//! ## Document Format
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <map version="1.0" orientation="orthogonal" width="2" height="1" tilewidth="8" tileheight="8">
//!  <tileset firstgid="1" name="t" tilewidth="8" tileheight="8" tilecount="2"/>
//!  <layer name="L" width="2" height="1">
//!   <data encoding="base64">AQAAAAIAAAA=</data>
//!  </layer>
//! </map>
//! ```
//!
//! ## Tile Data
//!
//! Each tile layer stores one global tile ID (GID) per cell, row-major. The
//! IDs are packed as little-endian `u32`s, optionally compressed with zlib or
//! gzip, then base64 encoded. GID 0 is an empty cell.
//!
//! ## Global Tile IDs
//!
//! Tilesets are numbered in document order: the first tileset starts at GID 1
//! and each following tileset starts right after the last tile of the one
//! before it. The `firstgid` attributes are derived from this order when
//! writing and checked against it when reading.
//!
//! ## Strict Schema
//!
//! Every element's attributes are checked against the set the decoder knows.
//! Unknown attributes and unknown child elements are errors rather than being
//! silently dropped.

pub mod color;
pub mod data;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod map;
pub mod markup;
pub mod resolver;

pub use color::Color;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{AttributeProblem, Error, Result};
pub use map::{
    Compression, DataEncoding, ExternalTileset, Image, ImageTileset, Layer, Map, MapObject,
    ObjectLayer, Properties, TileLayer, Tileset,
};
pub use markup::{Element, ParseConfig};
pub use resolver::{FileResolver, TilesetResolver};

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(map: &Map) -> Map {
        let text = Encoder::new().encode(map).unwrap();
        Decoder::new().decode(&text, None).unwrap()
    }

    fn sample_map(compression: Compression, orientation: &str) -> Map {
        let mut map = Map::new((3, 2), (16, 16));
        map.orientation = orientation.to_string();
        map.properties.insert("title".to_string(), "Level <1> & \"friends\"".to_string());

        let mut ground = ImageTileset::new("ground", 16, 16)
            .with_image(Image::new("ground.png").with_size(64, 32));
        ground.image.as_mut().unwrap().transparent_color = Some(Color::new(255, 0, 255));
        ground.properties.insert("kind".to_string(), "terrain".to_string());
        ground
            .tile_properties
            .insert(3, Properties::from([("solid".to_string(), "true".to_string())]));
        map.tilesets.push(ground.into());

        let items = ImageTileset {
            margin: 1,
            spacing: 2,
            ..ImageTileset::new("items", 32, 32).with_tile_count(5)
        };
        map.tilesets.push(items.into());

        let mut tiles = TileLayer::new("ground", vec![1, 2, 3, 0, 9, 13]).with_compression(compression);
        tiles.opacity = 0.75;
        tiles.properties.insert("z".to_string(), "0".to_string());
        map.layers.push(tiles.into());

        let mut objects = ObjectLayer::new("things");
        objects.visible = false;
        objects.objects.push(MapObject::new(4, -8));
        objects.objects.push(MapObject {
            name: Some("chest".to_string()),
            object_type: Some("loot".to_string()),
            ..MapObject::new(10, 20).with_gid(9).with_size(32, 32)
        });
        objects.objects.push(MapObject::new(0, 0).with_gid(9).with_size(64, 16));
        objects.objects.push(MapObject::new(1, 1).with_size(5, 6));
        map.layers.push(objects.into());

        map
    }

    #[test]
    fn test_roundtrip_every_compression_and_orientation() {
        for compression in Compression::ALL {
            for orientation in ["orthogonal", "isometric", "staggered", "hexagonal", "custom"] {
                let map = sample_map(compression, orientation);
                assert_eq!(roundtrip(&map), map, "{} {}", compression, orientation);
            }
        }
    }

    #[test]
    fn test_roundtrip_two_by_one_scenario() {
        let mut map = Map::new((2, 1), (8, 8));
        map.tilesets.push(ImageTileset::new("t", 8, 8).with_tile_count(2).into());
        map.layers.push(TileLayer::new("L", vec![1, 2]).into());

        let decoded = roundtrip(&map);
        assert_eq!(decoded.first_gid(0), Some(1));
        assert_eq!(decoded.width(), 2);
        let Layer::Tiles(layer) = &decoded.layers[0] else {
            panic!("expected tile layer");
        };
        assert_eq!(layer.data, vec![1, 2]);
        assert_eq!(layer.compression, Compression::Zlib);
        assert_eq!(layer.encoding, DataEncoding::Base64);
    }

    #[test]
    fn test_first_gid_monotonic_in_output() {
        let map = sample_map(Compression::Zlib, "orthogonal");
        let root = Encoder::new().encode_element(&map).unwrap();
        let gids: Vec<&str> = root
            .children
            .iter()
            .filter(|c| c.tag == "tileset")
            .filter_map(|c| c.attribute("firstgid"))
            .collect();
        // "ground" is 4x2 tiles
        assert_eq!(gids, vec!["1", "9"]);
    }

    #[test]
    fn test_every_tile_layer_has_one_gid_per_cell() {
        let map = roundtrip(&sample_map(Compression::Gzip, "orthogonal"));
        for layer in &map.layers {
            if let Layer::Tiles(layer) = layer {
                assert_eq!(layer.data.len(), map.cell_count());
            }
        }
    }

    #[test]
    fn test_roundtrip_external_tileset() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ImageTileset::new("shared", 8, 8).with_tile_count(6);
        Encoder::new()
            .save_tileset(&shared, &dir.path().join("shared.tsx"))
            .unwrap();

        let mut map = Map::new((2, 2), (8, 8));
        map.tilesets.push(Tileset::External(ExternalTileset {
            source: "shared.tsx".to_string(),
            tileset: shared,
        }));
        map.tilesets.push(ImageTileset::new("local", 8, 8).with_tile_count(1).into());
        map.layers.push(TileLayer::new("L", vec![1, 6, 7, 0]).into());

        let path = dir.path().join("map.tmx");
        Encoder::new().save(&map, &path).unwrap();
        let decoded = Decoder::new().open(&path).unwrap();

        assert_eq!(decoded, map);
        assert_eq!(decoded.first_gids(), vec![1, 7]);
    }
}
