#![no_main]

use libfuzzer_sys::fuzz_target;
use rawmeta_io::{ContainerKind, Decoder, ExtractOptions};

fuzz_target!(|data: &[u8]| {
    // Any input must decode or fail with an error, never panic
    if let Ok(decoder) = rawmeta_io::decoder(data, ExtractOptions::default()) {
        let _ = decoder.extract_metadata();
        let _ = decoder.extract_jpeg();
    }

    // Force each decoder onto the same bytes, bypassing detection
    for kind in [
        ContainerKind::Fuji,
        ContainerKind::Cr3,
        ContainerKind::Tiff,
        ContainerKind::Jpeg,
        ContainerKind::Xmp,
    ] {
        let decoder = Decoder::for_kind(kind, data, ExtractOptions::new().skip_metadata(true));
        let _ = decoder.extract_metadata();
        let _ = decoder.extract_jpeg();
    }

    let _ = rawmeta_io::replace_ifd_entry(data, "Model", "fuzzed model");
    let _ = rawmeta_io::inject_exif_metadata(data, b"MM\0*\0\0\0\x08\0\0\0\0\0\0");
});
