#![no_main]

use avifglue::{ChromaUpsampling, Decoder, DecoderConfig};
use libfuzzer_sys::fuzz_target;

// First byte picks the upsampling filter, the rest is the file.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, file)) = data.split_first() else {
        return;
    };
    let upsampling = match selector % 5 {
        0 => ChromaUpsampling::Automatic,
        1 => ChromaUpsampling::Fastest,
        2 => ChromaUpsampling::BestQuality,
        3 => ChromaUpsampling::Nearest,
        _ => ChromaUpsampling::Bilinear,
    };
    let config = DecoderConfig::new().upsampling(upsampling).threads(1);
    let Ok(mut decoder) = Decoder::new(file, &config) else {
        return;
    };
    let frames = decoder.info().frame_count.min(8);
    for index in 0..frames {
        if let Ok(frame) = decoder.frame(index) {
            let _ = frame.into_image();
        }
    }
    // out of range
    let _ = decoder.frame(frames);
});
