//! Cross-checks the codec against fastnbt's serde encoder and decoder.

use fastnbt::{ByteArray, IntArray};
use serde::{Deserialize, Serialize};
use tilecraft_nbt::{Compound, Compression, List, NbtFile, TagType};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Section {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Level {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "LastUpdate")]
    last_update: i64,
    #[serde(rename = "Biomes")]
    biomes: IntArray,
    #[serde(rename = "Sections")]
    sections: Vec<Section>,
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Root {
    #[serde(rename = "Level")]
    level: Level,
}

fn fixture() -> Root {
    Root {
        level: Level {
            x_pos: -3,
            z_pos: 17,
            last_update: 987654321,
            biomes: IntArray::new(vec![4; 16]),
            sections: vec![
                Section {
                    y: 0,
                    blocks: ByteArray::new(vec![1; 64]),
                },
                Section {
                    y: 5,
                    blocks: ByteArray::new((0..64).map(|i| i as i8 - 32).collect()),
                },
            ],
            status: "full".to_string(),
        },
    }
}

#[test]
fn test_decode_fastnbt_output() {
    let bytes = fastnbt::to_bytes(&fixture()).unwrap();
    let file = NbtFile::from_bytes(&bytes, Compression::None).unwrap();

    let level = file.get_compound("Level").unwrap();
    assert_eq!(level.get_int("xPos"), Some(-3));
    assert_eq!(level.get_int("zPos"), Some(17));
    assert_eq!(level.get_long("LastUpdate"), Some(987654321));
    assert_eq!(level.get_int_array("Biomes"), Some(&[4; 16][..]));
    assert_eq!(level.get_str("Status"), Some("full"));

    assert!(level.has_list("Sections", TagType::Compound));
    let sections = level.get_list("Sections").and_then(List::as_compounds).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[1].get_byte("Y"), Some(5));
    let blocks = sections[1].get_byte_array("Blocks").unwrap();
    assert_eq!(blocks.len(), 64);
    assert_eq!(blocks[0], (-32i8) as u8);
}

#[test]
fn test_fastnbt_reads_our_output() {
    let section = |y: i8, fill: u8| Compound::new().with("Y", y).with("Blocks", vec![fill; 64]);
    let level = Compound::new()
        .with("xPos", -3i32)
        .with("zPos", 17i32)
        .with("LastUpdate", 987654321i64)
        .with("Biomes", vec![4i32; 16])
        .with("Sections", List::Compound(vec![section(0, 1), section(5, 2)]))
        .with("Status", "full");
    let file = NbtFile::new("", Compound::new().with("Level", level));

    let bytes = file.to_bytes(Compression::None).unwrap();
    let root: Root = fastnbt::from_bytes(&bytes).unwrap();

    assert_eq!(root.level.x_pos, -3);
    assert_eq!(root.level.biomes, IntArray::new(vec![4; 16]));
    assert_eq!(root.level.sections.len(), 2);
    assert_eq!(root.level.sections[1].blocks, ByteArray::new(vec![2; 64]));
}

#[test]
fn test_both_directions_agree() {
    let bytes = fastnbt::to_bytes(&fixture()).unwrap();
    let ours = NbtFile::from_bytes(&bytes, Compression::None)
        .unwrap()
        .to_bytes(Compression::None)
        .unwrap();
    let back: Root = fastnbt::from_bytes(&ours).unwrap();
    assert_eq!(back, fixture());
}
