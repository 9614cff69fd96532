use jpegtensor_rs::{
    BatchTensor, DecodeOptions, EncodeOptions, ImageTensor, JpegCodec, JpegError, PixelFormat, ScalingFactor,
    TensorLayout, TensorView,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_log::test;

fn noisy_pixels(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..width * height * 3)
        .map(|i| ((i / 3 % width) * 4) as u8 ^ rng.random_range(0..8))
        .collect()
}

fn encode(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let pixels = noisy_pixels(width as usize, height as usize, seed);
    JpegCodec::new()
        .encode(&pixels, width, height, 0, &EncodeOptions::default())
        .unwrap()
}

#[test]
fn decoded_tensors_match_the_packed_decode() {
    let codec = JpegCodec::new();
    let jpeg = encode(21, 13, 1);
    let packed = codec.decode(&jpeg, &DecodeOptions::default()).unwrap();

    let hwc = codec
        .decode_tensor(&jpeg, &DecodeOptions::default(), TensorLayout::Hwc)
        .unwrap();
    assert_eq!(hwc.shape(), [13, 21, 3]);
    assert_eq!(hwc.as_slice(), packed.data.as_slice());

    let chw = codec
        .decode_tensor(&jpeg, &DecodeOptions::default(), TensorLayout::Chw)
        .unwrap();
    assert_eq!(chw.shape(), [3, 13, 21]);
    for y in 0..13 {
        for x in 0..21 {
            for c in 0..3 {
                assert_eq!(chw.get(y, x, c), hwc.get(y, x, c));
            }
        }
    }
    // Plane 1 starts with the green samples of the first row.
    assert_eq!(chw.as_slice()[13 * 21], packed.data[1]);

    let gray = codec
        .decode_tensor(
            &jpeg,
            &DecodeOptions::default().with_pixel_format(PixelFormat::Gray),
            TensorLayout::Chw,
        )
        .unwrap();
    assert_eq!(gray.shape(), [1, 13, 21]);

    let half = codec
        .decode_tensor(
            &jpeg,
            &DecodeOptions::default().with_scaling(ScalingFactor::new(1, 2)),
            TensorLayout::Hwc,
        )
        .unwrap();
    assert_eq!(half.shape(), [7, 11, 3]);
}

#[test]
fn strided_and_planar_views_encode_like_packed_pixels() {
    let codec = JpegCodec::new();
    let (width, height) = (19usize, 11usize);
    let pixels = noisy_pixels(width, height, 2);
    let packed_view = TensorView::packed(&pixels, height, width, 3).unwrap();
    let reference = codec.encode_tensor(&packed_view, &EncodeOptions::default()).unwrap();
    assert_eq!(
        reference,
        codec
            .encode(&pixels, width as u32, height as u32, 0, &EncodeOptions::default())
            .unwrap()
    );

    // Rows padded to a 64-byte pitch.
    let pitch = 64;
    let mut padded = vec![0u8; pitch * height];
    for y in 0..height {
        padded[y * pitch..y * pitch + width * 3].copy_from_slice(&pixels[y * width * 3..(y + 1) * width * 3]);
    }
    let strided = TensorView::new(&padded, height, width, 3, [pitch, 3, 1]).unwrap();
    assert!(strided.has_packed_rows());
    assert_eq!(codec.encode_tensor(&strided, &EncodeOptions::default()).unwrap(), reference);

    let planar = ImageTensor::from_vec(pixels.clone(), height, width, 3, TensorLayout::Hwc)
        .unwrap()
        .into_layout(TensorLayout::Chw);
    assert_eq!(codec.encode_tensor(&planar.view(), &EncodeOptions::default()).unwrap(), reference);

    let rgba = EncodeOptions {
        pixel_format: PixelFormat::Rgba,
        ..EncodeOptions::default()
    };
    assert_eq!(
        codec.encode_tensor(&packed_view, &rgba).unwrap_err(),
        JpegError::TensorShapeMismatch
    );
}

#[test]
fn batches_stack_same_sized_images() {
    let codec = JpegCodec::new();
    let first = encode(16, 8, 3);
    let second = encode(16, 8, 4);
    let other = encode(8, 16, 5);

    let batch = codec
        .decode_batch(&[&first, &second], &DecodeOptions::default(), TensorLayout::Chw)
        .unwrap();
    assert_eq!(batch.shape(), [2, 3, 8, 16]);
    assert_eq!(batch.len(), 2);
    assert_eq!(
        batch.image(1).unwrap(),
        codec
            .decode_tensor(&second, &DecodeOptions::default(), TensorLayout::Chw)
            .unwrap()
    );

    assert_eq!(
        codec
            .decode_batch(&[&first, &other], &DecodeOptions::default(), TensorLayout::Hwc)
            .unwrap_err(),
        JpegError::BatchDimensionMismatch
    );
    assert_eq!(
        codec
            .decode_batch(&[], &DecodeOptions::default(), TensorLayout::Hwc)
            .unwrap_err(),
        JpegError::EmptyBatch
    );

    let npy = batch.to_npy();
    let header_len = u16::from_le_bytes([npy[8], npy[9]]) as usize;
    let dict = std::str::from_utf8(&npy[10..10 + header_len]).unwrap();
    assert!(dict.contains("'shape': (2, 3, 8, 16)"));
    assert_eq!(npy.len(), 10 + header_len + 2 * 3 * 8 * 16);
    assert_eq!(BatchTensor::stack(vec![batch.image(0).unwrap()]).unwrap().shape(), [1, 3, 8, 16]);
}

#[test]
fn tensor_shapes_are_validated() {
    assert_eq!(
        ImageTensor::from_vec(vec![0; 10], 2, 2, 3, TensorLayout::Hwc).unwrap_err(),
        JpegError::TensorShapeMismatch
    );
    let data = [0u8; 12];
    assert_eq!(
        TensorView::new(&data, 2, 2, 3, [8, 3, 1]).unwrap_err(),
        JpegError::SourceTooSmall
    );
}
