// End-to-end tests through the public API, on synthetic fixtures from test_utils

use proptest::prelude::*;
use rawmeta_io::{
    byte_io::Endian, test_utils::*, ContainerKind, Error, ExtractOptions, JpegDecoder, MetadataValue,
    TiffDecoder, XmpEncoder, XmpUpdates,
};

fn canon_cmt() -> Vec<(&'static [u8; 4], Vec<u8>)> {
    let cmt1 = TiffBuilder::new(Endian::Little).build(
        &IfdBuilder::new()
            .ascii(0x010F, "Canon")
            .ascii(0x0110, "Canon EOS M50")
            .long(0x0100, 6000)
            .long(0x0101, 4000)
            .short(0x0112, 1),
    );
    let cmt2 = TiffBuilder::new(Endian::Little).build(
        &IfdBuilder::new()
            .short(0x8827, 100)
            .ascii(0x9003, "2018:03:30 14:38:06")
            .rational(0x829D, 56, 10)
            .ascii(0xA434, "EF-M15-45mm f/3.5-6.3 IS STM"),
    );
    vec![(b"CMT1", cmt1), (b"CMT2", cmt2)]
}

#[test]
fn test_single_entry_tiff() {
    let tiff = TiffBuilder::new(Endian::Big).build(&IfdBuilder::new().long(0x0100, 4928));
    assert_eq!(rawmeta_io::detect(&tiff), Some(ContainerKind::Tiff));

    let raw = rawmeta_io::extract_raw_metadata(&tiff).unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw["ImageWidth"], MetadataValue::Integer(4928));
    assert_eq!(TiffDecoder::new(&tiff).ifds().unwrap().len(), 1);
}

#[test]
fn test_circular_ifd_chain_terminates() {
    // MM, 42, IFD at 8 holding ImageWidth, next IFD pointing back at 8
    let mut tiff = vec![0x4D, 0x4D, 0x00, 0x2A, 0, 0, 0, 8];
    tiff.extend_from_slice(&[0, 1]);
    tiff.extend_from_slice(&[0x01, 0x00, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 0x13, 0x40]);
    tiff.extend_from_slice(&[0, 0, 0, 8]);

    let raw = rawmeta_io::extract_raw_metadata(&tiff).unwrap();
    assert_eq!(raw["ImageWidth"], MetadataValue::Integer(4928));
}

#[test]
fn test_unknown_input() {
    assert_eq!(rawmeta_io::detect(b"GIF89a\x01\x00"), None);
    assert!(matches!(
        rawmeta_io::extract_metadata(b"GIF89a\x01\x00"),
        Err(Error::UnrecognizedContainer(_))
    ));
}

#[test]
fn test_xmp_written_into_jpeg() {
    let jpeg = JpegBuilder::new(640, 480).build();
    let xmp = XmpEncoder::encode(&XmpUpdates::new().set("Rating", 1).set("Label", "Red"), None).unwrap();
    let tagged = rawmeta_io::inject_xmp_metadata(&jpeg, &xmp).unwrap();

    let metadata = rawmeta_io::extract_metadata(&tagged).unwrap();
    assert_eq!(metadata.rating, Some(1));
    assert_eq!(metadata.color_label.as_deref(), Some("Red"));
    assert_eq!((metadata.width, metadata.height), (Some(640), Some(480)));

    // a second edit rewrites the same segment
    let xmp = XmpEncoder::encode(&XmpUpdates::new().set("Rating", 5).keep("Label"), Some(xmp.as_slice())).unwrap();
    let retagged = rawmeta_io::inject_xmp_metadata(&tagged, &xmp).unwrap();
    let metadata = rawmeta_io::extract_metadata(&retagged).unwrap();
    assert_eq!(metadata.rating, Some(5));
    assert_eq!(metadata.color_label.as_deref(), Some("Red"));
}

#[test]
fn test_xmp_sidecar() {
    let xmp = XmpEncoder::encode(
        &XmpUpdates::new()
            .set("Rating", 3)
            .set("DateTimeOriginal", "2019-12-04T12:01:00")
            .set_keywords(&["yosemite", "half dome"]),
        None,
    )
    .unwrap();
    let sidecar = XmpEncoder::wrap_in_packet(&xmp);
    assert_eq!(rawmeta_io::detect(&sidecar), Some(ContainerKind::Xmp));

    let metadata = rawmeta_io::extract_metadata(&sidecar).unwrap();
    assert_eq!(metadata.rating, Some(3));
    assert_eq!(
        metadata.keywords,
        Some(vec!["yosemite".to_string(), "half dome".to_string()])
    );
    assert_eq!(
        metadata.created_at.map(|date| date.to_rfc3339()),
        Some("2019-12-04T12:01:00+00:00".to_string())
    );
    assert!(matches!(
        rawmeta_io::extract_jpeg(&sidecar, &ExtractOptions::default()),
        Err(Error::NoEmbeddedPreview)
    ));
}

#[test]
fn test_fuji_end_to_end() {
    let exif = TiffBuilder::new(Endian::Big).build(
        &IfdBuilder::new()
            .ascii(0x010F, "FUJIFILM")
            .ascii(0x0110, "X-T3")
            .exif(
                IfdBuilder::new()
                    .short(0x8827, 1600)
                    .rational(0x920A, 18, 1)
                    .short(0xA405, 27),
            ),
    );
    let jpeg = JpegBuilder::new(1920, 1280).exif(exif).build();
    let raf = raf_bytes("0201", &jpeg);
    assert_eq!(rawmeta_io::detect(&raf), Some(ContainerKind::Fuji));

    assert_eq!(rawmeta_io::extract_jpeg(&raf, &ExtractOptions::default()).unwrap(), jpeg);

    let metadata = rawmeta_io::extract_metadata(&raf).unwrap();
    assert_eq!(metadata.make.as_deref(), Some("FUJIFILM"));
    assert_eq!(metadata.model.as_deref(), Some("X-T3"));
    assert_eq!(metadata.iso, Some(1600));
    assert_eq!(metadata.focal_length, Some(18.0));
    assert_eq!(metadata.normalized_focal_length, Some(27.0));
    assert_eq!((metadata.width, metadata.height), (Some(1920), Some(1280)));
}

#[test]
fn test_cr3_end_to_end() {
    let small = JpegBuilder::new(160, 120).build();
    let large = JpegBuilder::new(1620, 1080).scan_len(4_096).build();
    let cr3 = cr3_bytes(&canon_cmt(), &[(160, 120, small), (1620, 1080, large.clone())]);
    assert_eq!(rawmeta_io::detect(&cr3), Some(ContainerKind::Cr3));

    let metadata = rawmeta_io::extract_metadata(&cr3).unwrap();
    assert_eq!(metadata.make.as_deref(), Some("Canon"));
    assert_eq!(metadata.iso, Some(100));
    assert_eq!(metadata.f_number, Some(5.6));
    assert_eq!((metadata.width, metadata.height), (Some(6000), Some(4000)));
    assert_eq!(
        metadata.created_at.map(|date| date.to_rfc3339()),
        Some("2018-03-30T14:38:06+00:00".to_string())
    );
    let lens = metadata.lens.unwrap();
    assert_eq!(lens.make.as_deref(), Some("EF"));
    assert_eq!(lens.focal_length.as_deref(), Some("45mm"));

    let stored = rawmeta_io::extract_jpeg(&cr3, &ExtractOptions::new().skip_metadata(true)).unwrap();
    assert_eq!(stored, large);

    let preview = rawmeta_io::extract_jpeg(&cr3, &ExtractOptions::default()).unwrap();
    let preview_metadata = rawmeta_io::extract_raw_metadata(&preview).unwrap();
    assert_eq!(preview_metadata["ISO"], MetadataValue::Integer(100));
    assert_eq!(preview_metadata["Orientation"], MetadataValue::Integer(1));
    assert!(!preview_metadata.contains_key("Make"));
    // dimensions come from the preview frame, not the RAW
    assert_eq!(preview_metadata["ImageWidth"], MetadataValue::Integer(1620));
}

#[test]
fn test_tiff_preview_tie_break() {
    let thumbnail = JpegBuilder::new(320, 240).scan_len(400_000).build();
    let strip = JpegBuilder::new(1600, 1200).scan_len(800_000).build();
    let tiff = TiffBuilder::new(Endian::Little).build(
        &IfdBuilder::new()
            .ascii(0x010F, "NIKON CORPORATION")
            .thumbnail(thumbnail)
            .sub_ifd(IfdBuilder::new().short(0x00FE, 1).jpeg_strip(strip.clone())),
    );

    let preview = rawmeta_io::extract_jpeg(&tiff, &ExtractOptions::new().skip_metadata(true)).unwrap();
    assert_eq!(preview, strip);
}

#[test]
fn test_replace_string_entry() {
    let tiff = TiffBuilder::new(Endian::Big).build(
        &IfdBuilder::new()
            .ascii(0x010F, "Panasonic")
            .ascii(0x0110, "DMC-GH4")
            .short(0x0112, 1),
    );

    let edited = rawmeta_io::replace_ifd_entry(&tiff, "Model", "DC-GH5S").unwrap();
    assert_eq!(edited.len(), tiff.len());
    let raw = rawmeta_io::extract_raw_metadata(&edited).unwrap();
    assert_eq!(raw["Model"], MetadataValue::Text("DC-GH5S".into()));
    assert_eq!(raw["Make"], MetadataValue::Text("Panasonic".into()));
    assert_eq!(raw["Orientation"], MetadataValue::Integer(1));

    assert!(matches!(
        rawmeta_io::replace_ifd_entry(&tiff, "Model", "G9"),
        Err(Error::InvalidMutationTarget(_))
    ));
    assert!(matches!(
        rawmeta_io::replace_ifd_entry(&tiff, "Artist", "someone"),
        Err(Error::InvalidMutationTarget(_))
    ));
}

#[test]
fn test_normalized_json() {
    let cr3 = cr3_bytes(&canon_cmt(), &[]);
    let metadata = rawmeta_io::extract_metadata(&cr3).unwrap();
    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json["make"], "Canon");
    assert_eq!(json["createdAt"], "2018-03-30T14:38:06Z");
    assert_eq!(json["lens"]["focalLength"], "45mm");
    assert_eq!(json["raw"]["ISO"], 100);
}

proptest! {
    #[test]
    fn prop_exif_reinjection_is_identity(
        orientation in 1u16..=8,
        iso in 50u16..=25_600,
        width in 1u16..=8_000,
        height in 1u16..=8_000,
        make in "[A-Za-z]{1,16}",
    ) {
        let exif = TiffBuilder::new(Endian::Little).build(
            &IfdBuilder::new()
                .ascii(0x010F, &make)
                .short(0x0112, orientation)
                .exif(IfdBuilder::new().short(0x8827, iso)),
        );
        let jpeg = JpegBuilder::new(width, height).exif(exif).build();
        let payload = JpegDecoder::new(&jpeg).exif_payload().unwrap().unwrap();
        let reinjected = rawmeta_io::inject_exif_metadata(&jpeg, payload).unwrap();
        prop_assert_eq!(reinjected, jpeg);
    }

    #[test]
    fn prop_xmp_reinjection_is_identity(rating in 0i64..=5, label in "[A-Za-z]{1,12}") {
        let xmp = XmpEncoder::encode(&XmpUpdates::new().set("Rating", rating).set("Label", label.as_str()), None)
            .unwrap();
        let jpeg = JpegBuilder::new(64, 64).xmp(&String::from_utf8(xmp).unwrap()).build();
        let payload = JpegDecoder::new(&jpeg).xmp_payload().unwrap().unwrap();
        let reinjected = rawmeta_io::inject_xmp_metadata(&jpeg, payload).unwrap();
        prop_assert_eq!(&reinjected, &jpeg);

        let raw = rawmeta_io::extract_raw_metadata(&jpeg).unwrap();
        prop_assert_eq!(&raw["Rating"], &MetadataValue::Integer(rating));
        prop_assert_eq!(&raw["Label"], &MetadataValue::Text(label));
    }
}
