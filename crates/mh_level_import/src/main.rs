use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Tiled stores flip state in the top three bits of each gid.
const GID_FLIP_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Deserialize)]
struct TiledMap {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    layers: Vec<TiledLayer>,
    tilesets: Vec<TiledTileset>,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    #[serde(rename = "type")]
    layer_type: String,
    name: String,
    #[serde(default)]
    data: Vec<u32>,
    #[serde(default)]
    objects: Vec<TiledObject>,
    #[serde(default)]
    properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
struct TiledObject {
    name: String,
    #[serde(default)]
    gid: Option<u32>,
    x: f32,
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
}

#[derive(Debug, Deserialize)]
struct TiledProperty {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TiledTileset {
    firstgid: u32,
    name: String,
}

#[derive(Debug, Serialize)]
struct LevelFile {
    version: String,
    level_id: String,
    tile_size: u32,
    width: u32,
    height: u32,
    layers: Vec<LevelLayer>,
    objects: Vec<LevelObject>,
}

#[derive(Debug, Serialize)]
struct LevelLayer {
    id: String,
    sheet: String,
    collides: bool,
    tiles: Vec<LevelTile>,
}

#[derive(Debug, Serialize)]
struct LevelTile {
    x: u32,
    y: u32,
    frame: u32,
}

#[derive(Debug, Serialize)]
struct LevelObject {
    kind: String,
    x: f32,
    y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<u32>,
}

fn usage() -> String {
    "Usage: cargo run -p mh_level_import -- <tiled_json_input> <level_json_output> [--level-id <id>]\nExample: cargo run -p mh_level_import -- raw/meadow_tiled.json assets/levels/meadow.json --level-id meadow".to_string()
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 && args.len() != 5 {
        return Err(usage());
    }

    let input_path = PathBuf::from(&args[1]);
    let output_path = PathBuf::from(&args[2]);
    let level_id = if args.len() == 5 {
        if args[3] != "--level-id" {
            return Err(usage());
        }
        args[4].clone()
    } else {
        output_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("level")
            .to_string()
    };

    let raw = fs::read_to_string(&input_path)
        .map_err(|e| format!("Failed to read '{}': {e}", input_path.display()))?;
    let map: TiledMap = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse '{}': {e}", input_path.display()))?;

    let level = convert_map(&map, &level_id)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create output dir '{}': {e}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(&level)
        .map_err(|e| format!("Failed to serialize level: {e}"))?;
    let json_tmp = temporary_output_path(&output_path);
    fs::write(&json_tmp, json)
        .map_err(|e| format!("Failed to write '{}': {e}", json_tmp.display()))?;
    promote_temporary_file(&json_tmp, &output_path)?;

    let tile_count: usize = level.layers.iter().map(|l| l.tiles.len()).sum();
    println!(
        "Imported {} tiles across {} layers and {} objects -> {}",
        tile_count,
        level.layers.len(),
        level.objects.len(),
        output_path.display()
    );
    Ok(())
}

/// Convert a parsed Tiled map into the engine's level format.
///
/// Tiled is y-down with row 0 at the top; the engine is y-up with row 0 at
/// the bottom. Tile objects (gid set) anchor at their bottom-left corner,
/// plain rectangle objects at their top-left; both become sprite centers.
fn convert_map(map: &TiledMap, level_id: &str) -> Result<LevelFile, String> {
    if map.width == 0 || map.height == 0 {
        return Err(format!(
            "Map dimensions must be positive, got {}x{}",
            map.width, map.height
        ));
    }
    if map.tilewidth != map.tileheight {
        return Err(format!(
            "Only square tiles are supported, got {}x{}",
            map.tilewidth, map.tileheight
        ));
    }
    if map.tilesets.is_empty() {
        return Err("Map has no tilesets".to_string());
    }

    let map_height_px = (map.height * map.tilewidth) as f32;
    let mut layers = Vec::new();
    let mut objects = Vec::new();
    let mut skipped_objects = 0usize;

    for layer in &map.layers {
        match layer.layer_type.as_str() {
            "tilelayer" => {
                layers.push(convert_tile_layer(map, layer)?);
            }
            "objectgroup" => {
                for object in &layer.objects {
                    match convert_object(map, layer, object, map_height_px)? {
                        Some(converted) => objects.push(converted),
                        None => skipped_objects += 1,
                    }
                }
            }
            // Image and group layers carry no level data.
            _ => {}
        }
    }

    let spawn_count = objects.iter().filter(|o| o.kind == "spawn").count();
    if spawn_count != 1 {
        return Err(format!(
            "Expected exactly one spawn object, found {}",
            spawn_count
        ));
    }

    if skipped_objects > 0 {
        eprintln!("Note: skipped {} unrecognized object(s)", skipped_objects);
    }

    Ok(LevelFile {
        version: "0.1".to_string(),
        level_id: level_id.to_string(),
        tile_size: map.tilewidth,
        width: map.width,
        height: map.height,
        layers,
        objects,
    })
}

fn convert_tile_layer(map: &TiledMap, layer: &TiledLayer) -> Result<LevelLayer, String> {
    let expected_len = (map.width * map.height) as usize;
    if layer.data.len() != expected_len {
        return Err(format!(
            "Tile layer '{}' has {} entries, expected {} for a {}x{} map",
            layer.name,
            layer.data.len(),
            expected_len,
            map.width,
            map.height
        ));
    }

    let collides = layer
        .properties
        .iter()
        .find(|p| p.name == "collides")
        .map(|p| p.value == serde_json::Value::Bool(true))
        .unwrap_or(false);

    // All tiles in a layer must come from one tileset; the engine binds a
    // single sheet per layer.
    let mut layer_sheet: Option<&TiledTileset> = None;
    let mut tiles = Vec::new();
    for (index, raw_gid) in layer.data.iter().enumerate() {
        let gid = raw_gid & GID_FLIP_MASK;
        if gid == 0 {
            continue;
        }
        let tileset = tileset_for_gid(map, gid).ok_or_else(|| {
            format!(
                "Tile layer '{}' cell {} has gid {} outside every tileset",
                layer.name, index, gid
            )
        })?;
        match layer_sheet {
            None => layer_sheet = Some(tileset),
            Some(existing) if existing.firstgid != tileset.firstgid => {
                return Err(format!(
                    "Tile layer '{}' mixes tilesets '{}' and '{}'",
                    layer.name, existing.name, tileset.name
                ));
            }
            Some(_) => {}
        }

        let column = index as u32 % map.width;
        let row = index as u32 / map.width;
        tiles.push(LevelTile {
            x: column,
            y: map.height - 1 - row,
            frame: gid - tileset.firstgid,
        });
    }

    let sheet = layer_sheet
        .map(|t| t.name.clone())
        .unwrap_or_else(|| map.tilesets[0].name.clone());
    Ok(LevelLayer {
        id: layer.name.clone(),
        sheet,
        collides,
        tiles,
    })
}

fn convert_object(
    map: &TiledMap,
    layer: &TiledLayer,
    object: &TiledObject,
    map_height_px: f32,
) -> Result<Option<LevelObject>, String> {
    let kind = match object.name.to_ascii_lowercase().as_str() {
        "spawn" => "spawn",
        "coin" => "coin",
        "jumpboost" => "jumpboost",
        _ => return Ok(None),
    };

    // Tile objects anchor bottom-left, everything else top-left.
    let center_x = object.x + object.width * 0.5;
    let center_y = match object.gid {
        Some(_) => map_height_px - object.y + object.height * 0.5,
        None => map_height_px - object.y - object.height * 0.5,
    };

    let (sheet, frame) = match object.gid {
        Some(raw_gid) => {
            let gid = raw_gid & GID_FLIP_MASK;
            let tileset = tileset_for_gid(map, gid).ok_or_else(|| {
                format!(
                    "Object '{}' in '{}' has gid {} outside every tileset",
                    object.name, layer.name, gid
                )
            })?;
            (Some(tileset.name.clone()), Some(gid - tileset.firstgid))
        }
        None => {
            if kind != "spawn" {
                return Err(format!(
                    "Object '{}' in '{}' needs a tile gid to render",
                    object.name, layer.name
                ));
            }
            (None, None)
        }
    };

    Ok(Some(LevelObject {
        kind: kind.to_string(),
        x: center_x,
        y: center_y,
        sheet,
        frame,
    }))
}

/// Find the tileset owning a gid: the one with the largest firstgid <= gid.
fn tileset_for_gid(map: &TiledMap, gid: u32) -> Option<&TiledTileset> {
    map.tilesets
        .iter()
        .filter(|t| t.firstgid <= gid)
        .max_by_key(|t| t.firstgid)
}

fn temporary_output_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    path.with_file_name(format!("{file_name}.tmp"))
}

fn promote_temporary_file(temp_path: &Path, final_path: &Path) -> Result<(), String> {
    if final_path.exists() {
        fs::remove_file(final_path).map_err(|e| {
            format!(
                "Failed to replace existing output '{}': {e}",
                final_path.display()
            )
        })?;
    }
    fs::rename(temp_path, final_path).map_err(|e| {
        format!(
            "Failed to move temporary output '{}' -> '{}': {e}",
            temp_path.display(),
            final_path.display()
        )
    })
}
