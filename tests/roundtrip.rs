use std::io::Write;

use fbx_io::fbx::{footer_code, ChecksumReader, ChecksumWriter, Timestamp};
use fbx_io::{
    AsciiReader, AsciiWriter, BinaryReader, BinaryWriter, FbxDocument, FbxError, FbxNode,
    FbxVersion, IdGenerator, Property,
};

const EXTENSION: [u8; 16] = [
    0xF8, 0x5A, 0x8C, 0x6A, 0xDE, 0xF5, 0xD9, 0x7E, 0xEC, 0xE9, 0x0C, 0xE3, 0x75, 0x8F, 0x29, 0x0B,
];

fn to_binary(document: &FbxDocument) -> Vec<u8> {
    let mut writer = BinaryWriter::new(Vec::new());
    writer.write(document).expect("binary write");
    writer.into_inner()
}

fn from_binary(bytes: &[u8]) -> FbxDocument {
    BinaryReader::new(bytes).read().expect("binary read")
}

fn to_ascii(document: &FbxDocument) -> String {
    let mut writer = AsciiWriter::new(Vec::new());
    writer.write(document).expect("ascii write");
    String::from_utf8(writer.into_inner()).expect("ascii output is utf-8")
}

fn from_ascii(text: &str) -> FbxDocument {
    AsciiReader::new(text.as_bytes()).read().expect("ascii read")
}

// A document exercising every binary-writable property kind, nested
// children and an explicitly opened-but-empty child block.
fn sample_document() -> FbxDocument {
    let mut document = FbxDocument::new(FbxVersion::V7_4);

    let header = document.add("FBXHeaderExtension");
    let stamp = header.add("CreationTimeStamp");
    stamp.add_value("Year", 2016);
    stamp.add_value("Month", 4);
    stamp.add_value("Day", 1);
    stamp.add_value("Hour", 12);
    stamp.add_value("Minute", 30);
    stamp.add_value("Second", 59);
    stamp.add_value("Millisecond", 250);

    let objects = document.add("Objects");
    let model = objects.add_values(
        "Model",
        [Property::from("Model::Cube"), Property::from("Mesh")],
    );
    model.add_value("Version", 232i32);
    model.add_value("Shading", true);
    model.add_value("MultiLayer", false);
    let geometry = objects.add("Geometry");
    geometry
        .properties
        .push(Property::DoubleArray(vec![0.5, -1.25, 3.0]));
    geometry
        .properties
        .push(Property::IntArray(vec![0, 1, 2, 300]));
    geometry
        .properties
        .push(Property::LongArray(vec![1, -9_000_000_000]));
    geometry
        .properties
        .push(Property::FloatArray(vec![1.5, -2.5]));
    geometry
        .properties
        .push(Property::BoolArray(vec![true, false, true]));
    geometry.properties.push(Property::Short(-42));
    geometry.properties.push(Property::Long(1 << 40));
    geometry.properties.push(Property::Float(0.25));
    geometry.properties.push(Property::Double(-12.125));
    geometry
        .properties
        .push(Property::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]));

    // Opened and closed with no content; must survive as one null entry.
    let empty = objects.add("Pose");
    empty.children.push(None);

    document.add("Takes").add_value("Current", "");
    document
}

#[test]
fn binary_roundtrip_preserves_structure() {
    let document = sample_document();
    let bytes = to_binary(&document);
    let reread = from_binary(&bytes);
    assert_eq!(document, reread, "binary round-trip changed the tree");
}

#[test]
fn binary_preserves_null_sentinel_child() {
    let document = sample_document();
    let reread = from_binary(&to_binary(&document));

    let pose = reread
        .get_relative("Objects/Pose")
        .expect("Pose node survives");
    assert_eq!(
        pose.children,
        vec![None],
        "explicitly emptied child block must keep exactly one null entry"
    );
    let takes = reread.child("Takes").expect("Takes node survives");
    assert_eq!(takes.children.len(), 1, "Takes keeps its real child");
    let version = reread
        .get_relative("Objects/Model/Version")
        .expect("Version node survives");
    assert!(
        version.children.is_empty(),
        "childless node must not grow a child list"
    );
}

#[test]
fn binary_string_separator_transform() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("Model", "Model::Cube::Mesh");

    let bytes = to_binary(&document);
    let needle = b"Mesh\x00\x01Cube\x00\x01Model";
    assert!(
        bytes.windows(needle.len()).any(|w| w == &needle[..]),
        "wire form must hold reversed segments joined by control bytes"
    );

    let reread = from_binary(&bytes);
    assert_eq!(
        reread.nodes[0].value(),
        Some(&Property::String("Model::Cube::Mesh".to_string())),
        "separator transform must invert on read"
    );
}

// Single node "A" with one int array: the compress flag lives at a fixed
// offset (23 magic + 4 version + 12 record header + 1 name length + 1 name
// + 1 tag + 4 count).
const FLAG_OFFSET: usize = 46;

#[test]
fn array_below_threshold_stays_raw() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    let elements: Vec<i32> = (0..255).collect(); // 1020 raw bytes
    document.add_value("A", elements.clone());

    let bytes = to_binary(&document);
    let flag = u32::from_le_bytes(bytes[FLAG_OFFSET..FLAG_OFFSET + 4].try_into().unwrap());
    assert_eq!(flag, 0, "1020 bytes is below the default threshold");

    let reread = from_binary(&bytes);
    assert_eq!(reread.nodes[0].value(), Some(&Property::IntArray(elements)));
}

#[test]
fn array_at_threshold_is_compressed() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    let elements: Vec<i32> = (0..256).collect(); // 1024 raw bytes
    document.add_value("A", elements.clone());

    let bytes = to_binary(&document);
    let flag = u32::from_le_bytes(bytes[FLAG_OFFSET..FLAG_OFFSET + 4].try_into().unwrap());
    assert_eq!(flag, 1, "1024 bytes meets the default threshold");

    let reread = from_binary(&bytes);
    assert_eq!(
        reread.nodes[0].value(),
        Some(&Property::IntArray(elements)),
        "decompression must reproduce the elements exactly"
    );
}

#[test]
fn compressed_array_cannot_expand_past_declared_size() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", vec![7i32; 1024]);
    let mut bytes = to_binary(&document);

    // Shrink the declared element count; the tiny deflate body still
    // expands to 4096 bytes. Decompression must stop at the declared size
    // instead of materializing everything first.
    bytes[42..46].copy_from_slice(&8u32.to_le_bytes());
    match BinaryReader::new(&bytes[..]).read() {
        Err(FbxError::Format { message, .. }) => assert!(
            message.contains("declared size"),
            "decompression must stop at the declared size, got {:?}",
            message
        ),
        other => panic!("expected format error, got {:?}", other),
    }
}

#[test]
fn blob_length_is_capped_before_allocation() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", vec![1u8, 2, 3]);
    let mut bytes = to_binary(&document);

    assert_eq!(bytes[41], b'R');
    bytes[42..46].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
    let err = BinaryReader::new(&bytes[..]).read().unwrap_err();
    assert!(
        matches!(err, FbxError::LimitExceeded { .. }),
        "a wire-declared multi-gigabyte blob must be rejected up front, got {:?}",
        err
    );
}

#[test]
fn compressed_block_length_is_capped_before_allocation() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", (0..256).collect::<Vec<i32>>());
    let mut bytes = to_binary(&document);

    // Byte-span field of the sole array property.
    bytes[50..54].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
    let err = BinaryReader::new(&bytes[..]).read().unwrap_err();
    assert!(
        matches!(err, FbxError::LimitExceeded { .. }),
        "a compressed block far larger than the raw data must be rejected, got {:?}",
        err
    );
}

#[test]
fn corrupted_compressed_array_fails_checksum() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", (0..256).collect::<Vec<i32>>());

    let mut bytes = to_binary(&document);
    // Flip one bit in the deflate body, past the settings header.
    bytes[FLAG_OFFSET + 12] ^= 0x40;
    let err = BinaryReader::new(&bytes[..]).read().unwrap_err();
    assert!(
        matches!(
            err,
            FbxError::ChecksumMismatch { .. } | FbxError::Format { .. }
        ),
        "corruption must surface as checksum or format error, got {:?}",
        err
    );
}

#[test]
fn checksum_incremental_matches_bulk() {
    let data: Vec<u8> = (0..40_000u32).map(|i| (i * 31 % 251) as u8).collect();

    let mut one_shot = ChecksumWriter::new(Vec::new());
    one_shot.write_all(&data).expect("bulk write");
    let (compressed, bulk) = one_shot.finish().expect("bulk finish");

    for chunk_size in [1usize, 7, 997, 4096] {
        let mut chunked = ChecksumWriter::new(Vec::new());
        for chunk in data.chunks(chunk_size) {
            chunked.write_all(chunk).expect("chunked write");
        }
        let (_, checksum) = chunked.finish().expect("chunked finish");
        assert_eq!(
            checksum, bulk,
            "chunk size {} must not change the checksum",
            chunk_size
        );
    }

    let reference = adler32::adler32(&data[..]).expect("reference checksum");
    assert_eq!(bulk, reference, "wrapper must agree with a bulk pass");

    // The read direction sees the same bytes, so it reports the same sum.
    let mut decoder = ChecksumReader::new(&compressed[..]);
    let mut restored = Vec::new();
    std::io::Read::read_to_end(&mut decoder, &mut restored).expect("decompress");
    assert_eq!(restored, data, "decompression must restore the payload");
    assert_eq!(decoder.checksum(), bulk);
}

#[test]
fn node_name_length_limit() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add("x".repeat(255));
    let reread = from_binary(&to_binary(&document));
    assert_eq!(reread.nodes[0].name.len(), 255);

    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add("x".repeat(256));
    let mut writer = BinaryWriter::new(Vec::new());
    let err = writer.write(&document).unwrap_err();
    assert!(
        matches!(err, FbxError::LimitExceeded { .. }),
        "256-byte name must fail with a length-limit error, got {:?}",
        err
    );
}

#[test]
fn byte_property_has_no_binary_codec() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add("A").properties.push(Property::Byte(5));
    let mut writer = BinaryWriter::new(Vec::new());
    let err = writer.write(&document).unwrap_err();
    assert!(matches!(err, FbxError::UnsupportedType { .. }));
}

#[test]
fn unknown_type_tag_is_fatal_with_offset() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", 7i32);
    let mut bytes = to_binary(&document);
    assert_eq!(bytes[41], b'I');
    bytes[41] = b'Q';
    match BinaryReader::new(&bytes[..]).read() {
        Err(FbxError::Format { offset, .. }) => assert_eq!(offset, 41),
        other => panic!("expected format error with offset, got {:?}", other),
    }
}

#[test]
fn truncated_stream_is_fatal() {
    let document = sample_document();
    let bytes = to_binary(&document);
    let err = BinaryReader::new(&bytes[..bytes.len() / 2]).read().unwrap_err();
    assert!(matches!(err, FbxError::Format { .. }), "got {:?}", err);
}

#[test]
fn footer_layout_is_structural() {
    let bytes = to_binary(&sample_document());
    let n = bytes.len();
    assert_eq!(bytes[n - 16..], EXTENSION, "trailing constant");
    assert!(
        bytes[n - 136..n - 16].iter().all(|&b| b == 0),
        "120 zero bytes before the trailing constant"
    );
    let version = u32::from_le_bytes(bytes[n - 140..n - 136].try_into().unwrap());
    assert_eq!(version, 7400, "version repeats in the footer");
    assert!(
        bytes[n - 160..n - 140].iter().all(|&b| b == 0),
        "20 zero bytes after the footer code"
    );

    // Structural corruption is rejected; the code itself is not re-derived.
    let mut corrupt = bytes.clone();
    let len = corrupt.len();
    corrupt[len - 1] ^= 0xFF;
    assert!(matches!(
        BinaryReader::new(&corrupt[..]).read(),
        Err(FbxError::Format { .. })
    ));
    let mut recoded = bytes.clone();
    let len = recoded.len();
    recoded[len - 160 - 16] ^= 0xFF; // inside the footer code
    assert!(
        BinaryReader::new(&recoded[..]).read().is_ok(),
        "the footer code is tolerated, only the structure is checked"
    );
}

#[test]
fn footer_code_is_timestamp_keyed() {
    let a = Timestamp {
        year: 2016,
        month: 4,
        day: 1,
        hour: 12,
        minute: 30,
        second: 59,
        millisecond: 250,
    };
    let mut b = a;
    b.minute = 31;
    let code_a = footer_code(&a).expect("valid timestamp");
    let code_b = footer_code(&b).expect("valid timestamp");
    assert_ne!(code_a, code_b, "different timestamps key different codes");
    assert_eq!(code_a, footer_code(&a).expect("valid timestamp"));

    let mut bad = a;
    bad.month = 13;
    assert!(matches!(
        footer_code(&bad),
        Err(FbxError::InvalidArgument(_))
    ));
}

#[test]
fn ascii_parses_simple_node() {
    let document = from_ascii("Count: 5");
    assert_eq!(document.nodes.len(), 1);
    let node = &document.nodes[0];
    assert_eq!(node.name, "Count");
    assert_eq!(node.properties, vec![Property::Byte(5)]);
    assert!(node.children.is_empty());
}

#[test]
fn ascii_array_narrowing() {
    let cases: &[(&str, Property)] = &[
        ("A: *3 { a: 1,2,3 }", Property::Bytes(vec![1, 2, 3])),
        ("A: *3 { a: 1,2,400 }", Property::IntArray(vec![1, 2, 400])),
        (
            "A: *2 { a: 1,5000000000 }",
            Property::LongArray(vec![1, 5_000_000_000]),
        ),
        (
            "A: *3 { a: 1,2.5,3 }",
            Property::DoubleArray(vec![1.0, 2.5, 3.0]),
        ),
    ];
    for (text, expected) in cases {
        let document = from_ascii(text);
        assert_eq!(
            document.nodes[0].properties,
            vec![expected.clone()],
            "element type inference for {:?}",
            text
        );
    }
}

#[test]
fn ascii_array_length_cap() {
    let mut reader = AsciiReader::new(&b"A: *100 { a: 1 }"[..]);
    reader.max_array_length = 10;
    assert!(matches!(
        reader.read(),
        Err(FbxError::LimitExceeded { .. })
    ));
}

#[test]
fn ascii_unterminated_string_reports_stream_end() {
    let text = "Thing: \"abc";
    match AsciiReader::new(text.as_bytes()).read() {
        Err(FbxError::Format { offset, .. }) => {
            assert_eq!(offset, text.len() as u64, "offset is the end of stream")
        }
        other => panic!("expected format error, got {:?}", other),
    }
}

#[test]
fn ascii_comments_and_whitespace_collapse() {
    let text = "; a comment line\n\nCount:\t 5 ; trailing comment\nNext: \"v\"\n";
    let document = from_ascii(text);
    assert_eq!(document.nodes.len(), 2);
    assert_eq!(document.nodes[0].properties, vec![Property::Byte(5)]);
    assert_eq!(
        document.nodes[1].properties,
        vec![Property::String("v".to_string())]
    );
}

#[test]
fn ascii_bare_char_literal() {
    let document = from_ascii("Shading: T\nCulling: F");
    assert_eq!(document.nodes[0].properties, vec![Property::Bool(true)]);
    assert_eq!(document.nodes[1].properties, vec![Property::Bool(false)]);
}

#[test]
fn ascii_unexpected_token_is_fatal() {
    assert!(matches!(
        AsciiReader::new(&b"Count: 5, , 6"[..]).read(),
        Err(FbxError::Format { .. })
    ));
    assert!(matches!(
        AsciiReader::new(&b"{ 5 }"[..]).read(),
        Err(FbxError::Format { .. })
    ));
    assert!(matches!(
        AsciiReader::new(&b"Node: {"[..]).read(),
        Err(FbxError::Format { .. })
    ));
}

#[test]
fn ascii_roundtrip_preserves_values() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    let objects = document.add("Objects");
    let model = objects.add_value("Model", "Model::Cube");
    model.add_value("Visible", true);
    model.add_value("Weight", 0.75f64);
    model.add_value("Count", 1000i32);
    model.add_value("Big", 5_000_000_000i64);
    let mesh = objects.add("Mesh");
    mesh.properties
        .push(Property::IntArray(vec![300, 400, 500]));
    mesh.properties.push(Property::DoubleArray(vec![1.5, -2.0]));
    let empty = objects.add("Pose");
    empty.children.push(None);

    let reread = from_ascii(&to_ascii(&document));
    assert_eq!(document, reread, "ascii round-trip changed the tree");
}

#[test]
fn ascii_empty_child_block_roundtrip() {
    let document = from_ascii("Pose: {\n}\n");
    assert_eq!(document.nodes[0].children, vec![None]);
    let text = to_ascii(&document);
    let again = from_ascii(&text);
    assert_eq!(document, again);
}

#[test]
fn ascii_version_controls_array_framing() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("A", vec![300i32, 400, 500]);
    let text = to_ascii(&document);
    assert!(text.starts_with("; FBX 7.4.0 project file\n"));
    assert!(text.contains("*3 {"), "7.4 frames arrays: {:?}", text);
    assert!(text.contains("a: 300,400,500"));

    document.version = FbxVersion::V7_0;
    let text = to_ascii(&document);
    assert!(text.starts_with("; FBX 7.0.0 project file\n"));
    assert!(!text.contains('*'), "7.0 writes bare elements: {:?}", text);
    assert!(text.contains("A: 300,400,500"));
}

#[test]
fn non_finite_floats_have_no_text_form() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("Weight", f64::NAN);
    let mut writer = AsciiWriter::new(Vec::new());
    assert!(matches!(
        writer.write(&document),
        Err(FbxError::UnsupportedType { .. })
    ));

    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("Points", vec![1.0f64, f64::INFINITY]);
    let mut writer = AsciiWriter::new(Vec::new());
    assert!(matches!(
        writer.write(&document),
        Err(FbxError::UnsupportedType { .. })
    ));
}

#[test]
fn add_values_appends_in_order() {
    let mut objects = FbxNode::new("Objects");
    let model = objects.add_values(
        "Model",
        [
            Property::from("Model::Cube"),
            Property::from("Mesh"),
            Property::from(232i32),
        ],
    );
    assert_eq!(
        model.properties,
        vec![
            Property::String("Model::Cube".to_string()),
            Property::String("Mesh".to_string()),
            Property::Int(232),
        ]
    );
}

#[test]
fn ascii_writer_concatenates_on_one_stream() {
    let mut document = FbxDocument::new(FbxVersion::V7_4);
    document.add_value("Count", 1000i32);

    let mut writer = AsciiWriter::new(Vec::new());
    writer.write(&document).expect("first write");
    writer.write(&document).expect("second write");
    let text = String::from_utf8(writer.into_inner()).expect("utf-8");

    let reread = from_ascii(&text);
    assert_eq!(reread.nodes.len(), 2, "two writes concatenate");
    assert_eq!(reread.nodes[0], reread.nodes[1]);
}

#[test]
fn path_lookup_and_emptiness() {
    let document = sample_document();
    let stamp = document
        .get_relative("FBXHeaderExtension/CreationTimeStamp")
        .expect("path resolves");
    assert_eq!(
        stamp.child("Year").and_then(|n| n.value()),
        Some(&Property::Int(2016))
    );
    assert_eq!(
        stamp.get_relative("Year//"),
        stamp.child("Year"),
        "empty segments are skipped"
    );
    assert!(document.get_relative("FBXHeaderExtension/Missing").is_none());
    assert!(FbxNode::default().is_empty());
    assert!(!stamp.is_empty());
}

#[test]
fn id_generator_is_explicit_and_resettable() {
    let mut ids = IdGenerator::with_seed(100);
    assert_eq!(ids.next_id(), 100);
    assert_eq!(ids.next_id(), 101);
    ids.reset(100);
    assert_eq!(ids.next_id(), 100, "reset replays the sequence");
    assert_eq!(IdGenerator::new().next_id(), IdGenerator::default().next_id());
}
