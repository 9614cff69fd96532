use jpegtensor_rs::jpeg1::dct::{BLOCK_DIM, DctMethod, InverseDct};
use std::time::Instant;

fn run(idct: &InverseDct, input: &[i32; BLOCK_DIM], iterations: u32) -> (std::time::Duration, Vec<u8>) {
    let size = idct.block_size();
    let mut output = vec![0u8; size * size];
    let start = Instant::now();
    for _ in 0..iterations {
        idct.transform(input, &mut output, size);
        // prevent optimization
        std::hint::black_box(&output);
    }
    (start.elapsed(), output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Benchmarking inverse DCT implementations...");

    // Dequantized coefficients of a smooth block
    let mut input = [0i32; BLOCK_DIM];
    input[..4].copy_from_slice(&[80, 40, -16, 8]);
    input[8..10].copy_from_slice(&[24, 8]);
    input[16] = -8;

    let iterations = 1_000_000;

    let islow = InverseDct::new(DctMethod::IntegerSlow, 8)?;
    let (duration_islow, output_islow) = run(&islow, &input, iterations);
    println!("Integer (islow) IDCT: {:?} for {} iterations", duration_islow, iterations);

    let float = InverseDct::new(DctMethod::Float, 8)?;
    let (duration_float, output_float) = run(&float, &input, iterations);
    println!("Float IDCT: {:?} for {} iterations", duration_float, iterations);

    let speedup = duration_float.as_secs_f64() / duration_islow.as_secs_f64();
    println!("Speedup of islow over float: {:.2}x", speedup);

    for size in [1, 2, 4, 16] {
        let scaled = InverseDct::new(DctMethod::IntegerSlow, size)?;
        let (duration, _) = run(&scaled, &input, iterations / 4);
        println!("Scaled {}x{} IDCT: {:?} for {} iterations", size, size, duration, iterations / 4);
    }

    let max_diff = output_islow
        .iter()
        .zip(&output_float)
        .map(|(a, b)| a.abs_diff(*b))
        .max()
        .unwrap_or(0);
    println!("Max difference between islow and float: {}", max_diff);

    if max_diff <= 1 {
        println!("Accuracy: PASSED (Tolerance <= 1)");
    } else {
        println!("Accuracy: FAILED (Tolerance > 1)");
    }
    Ok(())
}
