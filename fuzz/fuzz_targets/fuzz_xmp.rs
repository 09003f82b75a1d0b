#![no_main]

use libfuzzer_sys::fuzz_target;
use rawmeta_io::{XmpDecoder, XmpEncoder, XmpUpdates};

fuzz_target!(|data: &[u8]| {
    let _ = XmpDecoder::new(data).extract_metadata();

    // Edits of arbitrary packets must fail cleanly
    let updates = XmpUpdates::new()
        .set("Rating", 3)
        .set("Label", "Red")
        .remove("DateTimeOriginal")
        .set_keywords(&["fuzz", "<&>"]);
    if let Ok(xmp) = XmpEncoder::encode(&updates, Some(data)) {
        let _ = XmpDecoder::new(&xmp).extract_metadata();
        let _ = XmpEncoder::encode(&XmpUpdates::new().remove("Rating"), Some(&xmp));
    }

    let wrapped = XmpEncoder::wrap_in_packet(data);
    let _ = XmpEncoder::encode(&updates, Some(&wrapped));
});
