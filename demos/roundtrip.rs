//! Example of encoding and decoding a TMX map with every tile data compression

use emx_tmx::{
    decoder::Decoder,
    encoder::Encoder,
    map::{Compression, Image, ImageTileset, Layer, Map, MapObject, ObjectLayer, TileLayer},
};

fn main() -> anyhow::Result<()> {
    println!("=== TMX Round-Trip Example ===\n");

    // 4x3 map of 16px tiles
    let mut map = Map::new((4, 3), (16, 16));
    map.properties.insert("title".to_string(), "Example level".to_string());

    // 64x32 image gives a 4x2 grid, GIDs 1..=8
    let ground = ImageTileset::new("ground", 16, 16)
        .with_image(Image::new("ground.png").with_size(64, 32));
    map.tilesets.push(ground.into());

    // Second tileset starts at GID 9
    map.tilesets
        .push(ImageTileset::new("items", 16, 16).with_tile_count(4).into());

    let data = vec![1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 9, 12];
    map.layers.push(TileLayer::new("ground", data).into());

    let mut objects = ObjectLayer::new("spawns");
    objects.objects.push(MapObject::new(16, 32).with_gid(10).with_size(16, 16));
    objects.objects.push(MapObject::new(0, 0).with_size(48, 16));
    map.layers.push(objects.into());

    println!("First GIDs: {:?}\n", map.first_gids());

    for compression in Compression::ALL {
        for layer in &mut map.layers {
            if let Layer::Tiles(layer) = layer {
                layer.compression = compression;
            }
        }

        let encoded = Encoder::new().encode(&map)?;
        println!("--- compression: {} ---", compression);
        println!("{}", encoded);

        // Verify round-trip
        let decoded = Decoder::new().decode(&encoded, None)?;
        assert_eq!(decoded, map);
    }

    println!("Round-trip verification passed!");

    Ok(())
}
