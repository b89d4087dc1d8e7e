//! Roundtrip encode/decode tests through libavif

use avifglue::{
    DecodedImage, Decoder, DecoderConfig, Encoder, EncoderConfig, Orientation, PixelLayout,
    Subsampling, decode, encode_rgb8, encode_rgba8, is_avif,
};
use imgref::Img;
use rgb::{Rgb, Rgba};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a simple 16x16 RGB8 test image with a gradient
fn make_rgb8_image() -> Img<Vec<Rgb<u8>>> {
    let mut pixels = Vec::with_capacity(16 * 16);
    for y in 0..16u8 {
        for x in 0..16u8 {
            pixels.push(Rgb {
                r: x * 16,
                g: y * 16,
                b: 128,
            });
        }
    }
    Img::new(pixels, 16, 16)
}

/// Create a simple 16x16 RGBA8 test image with a gradient and alpha
fn make_rgba8_image() -> Img<Vec<Rgba<u8>>> {
    let mut pixels = Vec::with_capacity(16 * 16);
    for y in 0..16u8 {
        for x in 0..16u8 {
            pixels.push(Rgba {
                r: x * 16,
                g: y * 16,
                b: 128,
                a: 200,
            });
        }
    }
    Img::new(pixels, 16, 16)
}

fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    color.repeat((width * height) as usize)
}

fn encode_still(width: u32, height: u32, pixels: &[u8], config: &EncoderConfig) -> Vec<u8> {
    let mut encoder = Encoder::new(width, height, config).expect("encoder should be created");
    encoder
        .add(pixels, 0, width, height, PixelLayout::Rgb, true)
        .expect("add should succeed");
    encoder.finish().expect("finish should succeed")
}

#[test]
fn solid_color_quality_100() {
    init_logging();
    let (width, height) = (13, 7);
    let pixels = solid_rgb(width, height, [200, 100, 50]);
    let avif = encode_still(width, height, &pixels, &EncoderConfig::new().quality(100).speed(10));
    assert!(is_avif(&avif));

    let mut decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decode should succeed");
    let info = decoder.info().clone();
    assert_eq!((info.width, info.height), (width, height));
    assert_eq!(info.frame_count, 1);
    assert_eq!(info.mode(), "RGB");
    assert_eq!(info.orientation, Orientation::Normal);

    let frame = decoder.frame(0).expect("frame 0 should decode");
    assert_eq!((frame.width, frame.height), (width, height));
    assert_eq!(frame.layout, PixelLayout::Rgb);
    assert_eq!(frame.pixels.len(), (frame.row_bytes * frame.height) as usize);
    assert_eq!(frame.row_bytes, width * 3);
    for (got, want) in frame.pixels.chunks_exact(3).zip(pixels.chunks_exact(3)) {
        for (g, w) in got.iter().zip(want) {
            assert!(g.abs_diff(*w) <= 8, "pixel {got:?} too far from {want:?}");
        }
    }
}

#[test]
fn roundtrip_rgb8() {
    init_logging();
    let img = make_rgb8_image();
    let config = EncoderConfig::new().quality(80).speed(10);
    let avif = encode_rgb8(img.as_ref(), &config).expect("encode should succeed");
    assert!(!avif.is_empty());

    let decoded = decode(&avif).expect("decode should succeed");
    assert_eq!(decoded.width(), 16);
    assert_eq!(decoded.height(), 16);
    assert!(!decoded.has_alpha());
    assert!(matches!(decoded, DecodedImage::Rgb8(_)));
}

#[test]
fn roundtrip_rgba8() {
    init_logging();
    let img = make_rgba8_image();
    let config = EncoderConfig::new().quality(80).speed(10);
    let avif = encode_rgba8(img.as_ref(), &config).expect("encode should succeed");

    let mut decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decode should succeed");
    assert_eq!(decoder.info().mode(), "RGBA");
    let frame = decoder.frame(0).expect("frame 0 should decode");
    assert_eq!(frame.layout, PixelLayout::Rgba);
    assert_eq!(frame.row_bytes, 16 * 4);
    for px in frame.pixels.chunks_exact(4) {
        assert!(px[3].abs_diff(200) <= 8, "alpha {}", px[3]);
    }

    let DecodedImage::Rgba8(img) = frame.into_image().expect("typed view") else {
        panic!("expected RGBA8");
    };
    assert_eq!((img.width(), img.height()), (16, 16));
}

#[test]
fn subsampling_variants_decode() {
    init_logging();
    let pixels = solid_rgb(8, 8, [10, 200, 30]);
    for subsampling in ["4:0:0", "4:2:0", "4:2:2", "4:4:4"] {
        let config = EncoderConfig::new()
            .subsampling(subsampling.parse::<Subsampling>().unwrap())
            .speed(10);
        let avif = encode_still(8, 8, &pixels, &config);
        let mut decoder = Decoder::new(avif, &DecoderConfig::new()).expect(subsampling);
        let frame = decoder.frame(0).expect(subsampling);
        assert_eq!(frame.pixels.len(), 8 * 8 * 3, "{subsampling}");
    }
}

#[test]
fn animation_timing() {
    init_logging();
    let (width, height) = (8, 8);
    let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
    let mut encoder =
        Encoder::new(width, height, &EncoderConfig::new().speed(10)).expect("encoder");
    for color in colors {
        encoder
            .add(&solid_rgb(width, height, color), 100, width, height, PixelLayout::Rgb, false)
            .expect("add frame");
    }
    assert_eq!(encoder.frames_added(), 3);
    let avif = encoder.finish().expect("finish");

    let mut decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decoder");
    assert_eq!(decoder.info().frame_count, 3);

    // frames can be requested in any order, and again
    for index in [2, 0, 1, 2] {
        let frame = decoder.frame(index).expect("frame");
        assert_eq!(frame.timestamp_ms(), 100 * u64::from(index));
        assert_eq!(frame.duration_ms(), 100);
        let dominant = frame.pixels[..3]
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(dominant, index as usize, "frame {index} colour");
    }
}

#[test]
fn metadata_roundtrip() {
    init_logging();
    let icc = b"not really an icc profile, but libavif only stores it".to_vec();
    let exif = b"II*\0\x08\0\0\0\0\0\0\0\0\0".to_vec();
    let xmp = b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"></x:xmpmeta>".to_vec();
    let config = EncoderConfig::new()
        .speed(10)
        .icc(icc.clone())
        .exif(exif.clone())
        .xmp(xmp.clone())
        .orientation(Orientation::Rotate90Cw);
    let avif = encode_still(6, 4, &solid_rgb(6, 4, [1, 2, 3]), &config);

    let decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decoder");
    let info = decoder.info();
    assert_eq!(info.icc.as_deref(), Some(&icc[..]));
    assert_eq!(info.xmp.as_deref(), Some(&xmp[..]));
    let got_exif = info.exif.as_deref().expect("exif present");
    assert!(got_exif.windows(4).any(|w| w == b"II*\0"));
    assert_eq!(info.orientation, Orientation::Rotate90Cw);
    // stored pixels keep their original shape
    assert_eq!((info.width, info.height), (6, 4));
}

#[test]
fn every_orientation_survives_the_container() {
    init_logging();
    let pixels = solid_rgb(4, 4, [9, 9, 9]);
    for code in 1..=8u8 {
        let config = EncoderConfig::new().speed(10).exif_orientation(code);
        let avif = encode_still(4, 4, &pixels, &config);
        let decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decoder");
        assert_eq!(decoder.info().orientation.exif(), code);
    }
}

#[test]
fn missing_metadata_is_none() {
    init_logging();
    let avif = encode_still(4, 4, &solid_rgb(4, 4, [0, 0, 0]), &EncoderConfig::new().speed(10));
    let decoder = Decoder::new(avif, &DecoderConfig::new()).expect("decoder");
    let info = decoder.info();
    assert_eq!(info.icc, None);
    assert_eq!(info.exif, None);
    assert_eq!(info.xmp, None);
}

#[test]
fn strided_typed_input() {
    init_logging();
    let buf = vec![Rgb::new(40u8, 80, 120); 10 * 6];
    let img = Img::new_stride(buf, 8, 6, 10);
    let avif = encode_rgb8(img.as_ref(), &EncoderConfig::new().speed(10)).expect("encode");
    let decoded = decode(&avif).expect("decode");
    assert_eq!((decoded.width(), decoded.height()), (8, 6));
}
