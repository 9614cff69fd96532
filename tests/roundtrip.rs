use jpegtensor_rs::options::RestartInterval;
use jpegtensor_rs::{
    ColorSpace, DecodeOptions, EncodeOptions, JpegCodec, JpegError, PixelFormat, SCALING_FACTORS, Subsampling,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_log::test;

const WIDTH: u32 = 37;
const HEIGHT: u32 = 29;

/// Smooth gradient with a little noise, packed RGB.
fn gradient(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = 20 + x * 200 / width;
            let g = 30 + y * 180 / height;
            let b = 60 + (x + y) * 120 / (width + height);
            for value in [r, g, b] {
                pixels.push((value as i32 + rng.random_range(-2..=2)).clamp(0, 255) as u8);
            }
        }
    }
    pixels
}

fn mean_error(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a.iter().zip(b).map(|(x, y)| x.abs_diff(*y) as u64).sum();
    total as f64 / a.len() as f64
}

fn encode(pixels: &[u8], width: u32, height: u32, options: &EncodeOptions) -> Vec<u8> {
    JpegCodec::new().encode(pixels, width, height, 0, options).unwrap()
}

#[test]
fn every_subsampling_round_trips() {
    let codec = JpegCodec::new();
    let pixels = gradient(WIDTH, HEIGHT, 1);
    for subsampling in [
        Subsampling::S444,
        Subsampling::S422,
        Subsampling::S420,
        Subsampling::S440,
        Subsampling::S411,
        Subsampling::S441,
    ] {
        let options = EncodeOptions {
            quality: 95,
            subsampling,
            ..EncodeOptions::default()
        };
        let jpeg = encode(&pixels, WIDTH, HEIGHT, &options);
        let header = codec.decode_header(&jpeg).unwrap();
        assert_eq!((header.width, header.height), (WIDTH, HEIGHT));
        assert_eq!(header.subsampling, Some(subsampling));
        assert_eq!(header.color_space, ColorSpace::YCbCr);

        let decoded = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();
        assert!(decoded.warnings.is_empty());
        let error = mean_error(&decoded.data, &pixels);
        assert!(error < 4.0, "{subsampling:?}: mean error {error}");
    }
}

#[test]
fn grayscale_encode_has_one_component() {
    let codec = JpegCodec::new();
    let pixels = gradient(WIDTH, HEIGHT, 2);
    let options = EncodeOptions {
        subsampling: Subsampling::Gray,
        quality: 95,
        ..EncodeOptions::default()
    };
    let jpeg = encode(&pixels, WIDTH, HEIGHT, &options);
    let header = codec.decode_header(&jpeg).unwrap();
    assert_eq!(header.color_space, ColorSpace::Gray);
    assert_eq!(header.component_count(), 1);
    assert_eq!(header.subsampling, Some(Subsampling::Gray));

    let gray = codec
        .decode(&jpeg, &DecodeOptions::default().with_pixel_format(PixelFormat::Gray))
        .unwrap();
    assert_eq!(gray.data.len(), (WIDTH * HEIGHT) as usize);

    // Gray expands to equal RGB channels.
    let rgb = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();
    for (pixel, &luma) in rgb.data.chunks_exact(3).zip(&gray.data) {
        assert_eq!(pixel, [luma, luma, luma]);
    }
}

#[test]
fn gray_pixels_encode_as_grayscale_with_any_subsampling() {
    let codec = JpegCodec::new();
    let luma: Vec<u8> = gradient(WIDTH, HEIGHT, 11).chunks_exact(3).map(|p| p[1]).collect();
    let options = EncodeOptions {
        pixel_format: PixelFormat::Gray,
        subsampling: Subsampling::S420,
        quality: 95,
        ..EncodeOptions::default()
    };
    let jpeg = encode(&luma, WIDTH, HEIGHT, &options);
    let header = codec.decode_header(&jpeg).unwrap();
    assert_eq!(header.color_space, ColorSpace::Gray);
    assert_eq!(header.component_count(), 1);

    let decoded = codec
        .decode(&jpeg, &DecodeOptions::default().with_pixel_format(PixelFormat::Gray))
        .unwrap();
    assert!(mean_error(&decoded.data, &luma) < 3.0);
}

#[test]
fn pixel_formats_reorder_the_same_samples() {
    let codec = JpegCodec::new();
    let jpeg = encode(&gradient(WIDTH, HEIGHT, 3), WIDTH, HEIGHT, &EncodeOptions::default());
    let rgb = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();

    for code in 1..=10u8 {
        let format = PixelFormat::from_code(code).unwrap();
        if format == PixelFormat::Gray {
            continue;
        }
        let decoded = codec
            .decode(&jpeg, &DecodeOptions::default().with_pixel_format(format))
            .unwrap();
        assert_eq!(decoded.pitch(), WIDTH as usize * format.pixel_size());
        for (reference, pixel) in rgb.data.chunks_exact(3).zip(decoded.data.chunks_exact(format.pixel_size())) {
            assert_eq!(pixel[format.red_offset().unwrap()], reference[0], "{format:?}");
            assert_eq!(pixel[format.green_offset().unwrap()], reference[1], "{format:?}");
            assert_eq!(pixel[format.blue_offset().unwrap()], reference[2], "{format:?}");
            if let Some(filler) = format.filler_offset() {
                assert_eq!(pixel[filler], 0xFF);
            }
        }
    }

    assert_eq!(
        codec
            .decode(&jpeg, &DecodeOptions::default().with_pixel_format(PixelFormat::Cmyk))
            .unwrap_err(),
        JpegError::UnsupportedColorConversion
    );
}

#[test]
fn cmyk_is_stored_as_ycck() {
    let codec = JpegCodec::new();
    let mut rng = StdRng::seed_from_u64(4);
    let (width, height) = (24u32, 16u32);
    let mut pixels = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let k = (rng.random_range(0..4) + x * 4) as u8;
            pixels.extend_from_slice(&[(x * 8) as u8, (y * 10) as u8, 100, k]);
        }
    }
    let options = EncodeOptions {
        pixel_format: PixelFormat::Cmyk,
        subsampling: Subsampling::S444,
        quality: 95,
        ..EncodeOptions::default()
    };
    let jpeg = encode(&pixels, width, height, &options);
    let header = codec.decode_header(&jpeg).unwrap();
    assert_eq!(header.color_space, ColorSpace::Ycck);
    assert_eq!(header.component_count(), 4);
    assert!(header.adobe.is_some());

    let decoded = codec
        .decode(&jpeg, &DecodeOptions::default().with_pixel_format(PixelFormat::Cmyk))
        .unwrap();
    assert!(mean_error(&decoded.data, &pixels) < 4.0);
    assert_eq!(
        codec.decode(&jpeg, &DecodeOptions::default()).unwrap_err(),
        JpegError::UnsupportedColorConversion
    );
}

#[test]
fn optimized_tables_and_restarts_do_not_change_pixels() {
    let codec = JpegCodec::new();
    let pixels = gradient(WIDTH, HEIGHT, 5);
    let base = EncodeOptions {
        subsampling: Subsampling::S420,
        ..EncodeOptions::default()
    };
    let reference_jpeg = encode(&pixels, WIDTH, HEIGHT, &base);
    let reference = codec.decode(&reference_jpeg, &DecodeOptions::default()).unwrap();

    let variants = [
        EncodeOptions {
            optimize_huffman: true,
            ..base
        },
        EncodeOptions {
            restart_interval: RestartInterval::Mcus(3),
            ..base
        },
        EncodeOptions {
            restart_interval: RestartInterval::Rows(1),
            optimize_huffman: true,
            ..base
        },
    ];
    for options in variants {
        let jpeg = encode(&pixels, WIDTH, HEIGHT, &options);
        let decoded = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();
        assert!(decoded.warnings.is_empty(), "{options:?}");
        assert_eq!(decoded.data, reference.data, "{options:?}");
    }

    let optimized = encode(&pixels, WIDTH, HEIGHT, &variants[0]);
    assert!(optimized.len() < reference_jpeg.len());
    let restarted = codec.decode_header(&encode(&pixels, WIDTH, HEIGHT, &variants[1])).unwrap();
    assert_eq!(restarted.restart_interval, 3);
}

#[test]
fn yuv_planes_round_trip() {
    let codec = JpegCodec::new();
    let jpeg = encode(
        &gradient(WIDTH, HEIGHT, 6),
        WIDTH,
        HEIGHT,
        &EncodeOptions {
            subsampling: Subsampling::S420,
            quality: 95,
            ..EncodeOptions::default()
        },
    );
    let yuv = codec.decode_to_yuv(&jpeg, &DecodeOptions::default()).unwrap();
    yuv.validate().unwrap();
    assert_eq!(yuv.subsampling, Subsampling::S420);
    assert_eq!((yuv.planes[0].width, yuv.planes[0].height), (38, 30));
    assert_eq!((yuv.planes[1].width, yuv.planes[1].height), (19, 15));

    let again = codec
        .encode_yuv(
            &yuv,
            &EncodeOptions {
                quality: 95,
                ..EncodeOptions::default()
            },
        )
        .unwrap();
    assert_eq!(codec.decode_header(&again).unwrap().subsampling, Some(Subsampling::S420));
    let second = codec.decode_to_yuv(&again, &DecodeOptions::default()).unwrap();
    for (a, b) in yuv.planes.iter().zip(&second.planes) {
        assert!(mean_error(&a.data, &b.data) < 2.0);
    }
}

#[test]
fn bottom_up_decode_flips_rows() {
    let codec = JpegCodec::new();
    let jpeg = encode(&gradient(WIDTH, HEIGHT, 7), WIDTH, HEIGHT, &EncodeOptions::default());
    let normal = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();
    let flipped = codec
        .decode(
            &jpeg,
            &DecodeOptions {
                bottom_up: true,
                ..DecodeOptions::default()
            },
        )
        .unwrap();
    for y in 0..HEIGHT as usize {
        assert_eq!(flipped.row(y), normal.row(HEIGHT as usize - 1 - y));
    }
}

#[test]
fn every_scaling_factor_decodes_at_its_size() {
    let codec = JpegCodec::new();
    let jpeg = encode(&gradient(WIDTH, HEIGHT, 8), WIDTH, HEIGHT, &EncodeOptions::default());
    let header = codec.decode_header(&jpeg).unwrap();
    assert_eq!(codec.scaling_factors().len(), SCALING_FACTORS.len());

    for &factor in codec.scaling_factors() {
        let decoded = codec
            .decode(&jpeg, &DecodeOptions::default().with_scaling(factor))
            .unwrap();
        let expected = codec.scaled_size(&header, factor).unwrap();
        assert_eq!((decoded.width, decoded.height), expected, "{factor}");
        assert_eq!(decoded.width, (WIDTH * factor.num).div_ceil(factor.denom));
        assert_eq!(decoded.data.len(), (expected.0 * expected.1 * 3) as usize);
    }
}

#[test]
fn decode_into_honours_pitch() {
    let codec = JpegCodec::new();
    let jpeg = encode(&gradient(WIDTH, HEIGHT, 9), WIDTH, HEIGHT, &EncodeOptions::default());
    let packed = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();

    let pitch = WIDTH as usize * 3 + 5;
    let mut buffer = vec![0xAAu8; pitch * HEIGHT as usize];
    let warnings = codec
        .decode_into(&jpeg, &DecodeOptions::default(), &mut buffer, pitch)
        .unwrap();
    assert!(warnings.is_empty());
    for y in 0..HEIGHT as usize {
        let row = &buffer[y * pitch..(y + 1) * pitch];
        assert_eq!(&row[..packed.pitch()], packed.row(y));
        assert!(row[packed.pitch()..].iter().all(|&b| b == 0xAA));
    }

    let mut small = vec![0u8; pitch * (HEIGHT as usize - 1)];
    assert_eq!(
        codec
            .decode_into(&jpeg, &DecodeOptions::default(), &mut small, pitch)
            .unwrap_err(),
        JpegError::DestinationTooSmall
    );
}

#[test]
fn encoder_rejects_bad_arguments() {
    let codec = JpegCodec::new();
    let pixels = gradient(8, 8, 10);
    let quality_zero = EncodeOptions {
        quality: 0,
        ..EncodeOptions::default()
    };
    assert_eq!(
        codec.encode(&pixels, 8, 8, 0, &quality_zero).unwrap_err(),
        JpegError::InvalidArgumentQuality
    );
    assert!(codec.encode(&pixels, 16, 8, 0, &EncodeOptions::default()).is_err());
    assert!(codec.encode(&pixels, 0, 8, 0, &EncodeOptions::default()).is_err());
}
