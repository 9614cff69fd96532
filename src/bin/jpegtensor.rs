//! jpegtensor CLI - baseline JPEG decode, encode and lossless transforms.

use clap::{Parser, Subcommand, ValueEnum};
use jpegtensor_rs::options::RestartInterval;
use jpegtensor_rs::{
    CropRegion, DecodeOptions, EncodeOptions, JpegCodec, PixelFormat, ScalingFactor, Subsampling, TensorLayout,
    Transform, TransformOperation, TransformOptions,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Baseline JPEG codec with lossless transforms and tensor output
#[derive(Parser)]
#[command(name = "jpegtensor")]
#[command(version)]
#[command(about = "Decode, encode and losslessly transform baseline JPEG images", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegtensor decode -i photo.jpg -o photo.ppm -f ppm
    jpegtensor decode -i photo.jpg -o photo.npy -f npy --layout chw --scale 1/2
    jpegtensor encode -i photo.ppm -o photo.jpg -q 90 -s 420
    jpegtensor encode -i pixels.raw -o out.jpg -w 640 -H 480 -p rgb
    jpegtensor transform -i photo.jpg -o rotated.jpg --op rot90 --trim
    jpegtensor info -i photo.jpg

Set RUST_LOG=debug to trace the codec.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a JPEG image to raw pixels, PPM/PGM or a NumPy array
    #[command(visible_alias = "d")]
    Decode {
        #[arg(short, long, help = "Path to the input JPEG")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the decoded output")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,

        /// Pixel format of the decoded samples
        #[arg(short, long, default_value = "rgb", value_enum)]
        pixel_format: PixelFormatArg,

        /// Scaling factor as num/denom, e.g. 1/2
        #[arg(long, default_value = "1/1", value_parser = parse_scaling)]
        scale: ScalingFactor,

        /// Axis order of NumPy output
        #[arg(long, default_value = "hwc", value_enum)]
        layout: LayoutArg,

        /// Use the float DCT instead of the accurate integer one
        #[arg(long)]
        fast_dct: bool,

        /// Replicate chroma instead of interpolating it
        #[arg(long)]
        fast_upsample: bool,

        /// Fail on the first corrupt-data warning
        #[arg(long)]
        strict: bool,
    },

    /// Encode raw pixels or a PPM/PGM image to JPEG
    ///
    /// Files ending in .ppm or .pgm carry their own size; raw input needs
    /// --width and --height.
    #[command(visible_alias = "e")]
    Encode {
        #[arg(short, long, help = "Path to a PPM/PGM file or raw pixel data")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the encoded JPEG")]
        output: PathBuf,

        /// Image width in pixels (raw input)
        #[arg(short, long)]
        width: Option<u32>,

        /// Image height in pixels (raw input)
        #[arg(short = 'H', long)]
        height: Option<u32>,

        /// Pixel format of raw input
        #[arg(short, long, default_value = "rgb", value_enum)]
        pixel_format: PixelFormatArg,

        #[arg(short, long, default_value = "85")]
        quality: u8,

        /// Chroma subsampling
        #[arg(short, long, default_value = "422", value_enum)]
        subsampling: SubsamplingArg,

        /// Write Huffman tables tuned to the image
        #[arg(long)]
        optimize: bool,

        /// Restart marker every N MCU rows
        #[arg(long)]
        restart_rows: Option<u16>,
    },

    /// Losslessly rotate, flip or crop a JPEG
    #[command(visible_alias = "t")]
    Transform {
        #[arg(short, long, help = "Path to the input JPEG")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the transformed JPEG")]
        output: PathBuf,

        #[arg(long, default_value = "none", value_enum)]
        op: OperationArg,

        /// Crop region as x,y,width,height in transformed coordinates
        #[arg(long, value_parser = parse_crop)]
        crop: Option<CropRegion>,

        /// Fail instead of leaving partial edge blocks untransformed
        #[arg(long)]
        perfect: bool,

        /// Drop partial edge blocks that cannot be transformed
        #[arg(long)]
        trim: bool,

        /// Keep only the luminance component
        #[arg(long)]
        gray: bool,

        /// Do not copy APPn/COM markers
        #[arg(long)]
        copy_none: bool,
    },

    /// Print header information
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to the JPEG to inspect")]
        input: PathBuf,
    },

    /// List the supported decode scaling factors
    ScalingFactors,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Raw,
    Ppm,
    Npy,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Hwc,
    Chw,
}

#[derive(Clone, Copy, ValueEnum)]
enum PixelFormatArg {
    Rgb,
    Bgr,
    Rgbx,
    Bgrx,
    Xbgr,
    Xrgb,
    Gray,
    Rgba,
    Bgra,
    Abgr,
    Argb,
    Cmyk,
}

impl From<PixelFormatArg> for PixelFormat {
    fn from(value: PixelFormatArg) -> Self {
        match value {
            PixelFormatArg::Rgb => PixelFormat::Rgb,
            PixelFormatArg::Bgr => PixelFormat::Bgr,
            PixelFormatArg::Rgbx => PixelFormat::Rgbx,
            PixelFormatArg::Bgrx => PixelFormat::Bgrx,
            PixelFormatArg::Xbgr => PixelFormat::Xbgr,
            PixelFormatArg::Xrgb => PixelFormat::Xrgb,
            PixelFormatArg::Gray => PixelFormat::Gray,
            PixelFormatArg::Rgba => PixelFormat::Rgba,
            PixelFormatArg::Bgra => PixelFormat::Bgra,
            PixelFormatArg::Abgr => PixelFormat::Abgr,
            PixelFormatArg::Argb => PixelFormat::Argb,
            PixelFormatArg::Cmyk => PixelFormat::Cmyk,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SubsamplingArg {
    #[value(name = "444")]
    S444,
    #[value(name = "422")]
    S422,
    #[value(name = "420")]
    S420,
    Gray,
    #[value(name = "440")]
    S440,
    #[value(name = "411")]
    S411,
    #[value(name = "441")]
    S441,
}

impl From<SubsamplingArg> for Subsampling {
    fn from(value: SubsamplingArg) -> Self {
        match value {
            SubsamplingArg::S444 => Subsampling::S444,
            SubsamplingArg::S422 => Subsampling::S422,
            SubsamplingArg::S420 => Subsampling::S420,
            SubsamplingArg::Gray => Subsampling::Gray,
            SubsamplingArg::S440 => Subsampling::S440,
            SubsamplingArg::S411 => Subsampling::S411,
            SubsamplingArg::S441 => Subsampling::S441,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OperationArg {
    None,
    Hflip,
    Vflip,
    Transpose,
    Transverse,
    Rot90,
    Rot180,
    Rot270,
}

impl From<OperationArg> for TransformOperation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::None => TransformOperation::None,
            OperationArg::Hflip => TransformOperation::HFlip,
            OperationArg::Vflip => TransformOperation::VFlip,
            OperationArg::Transpose => TransformOperation::Transpose,
            OperationArg::Transverse => TransformOperation::Transverse,
            OperationArg::Rot90 => TransformOperation::Rot90,
            OperationArg::Rot180 => TransformOperation::Rot180,
            OperationArg::Rot270 => TransformOperation::Rot270,
        }
    }
}

fn parse_scaling(value: &str) -> Result<ScalingFactor, String> {
    let (num, denom) = value.split_once('/').ok_or("expected num/denom")?;
    let factor = ScalingFactor::new(
        num.trim().parse().map_err(|e| format!("{e}"))?,
        denom.trim().parse().map_err(|e| format!("{e}"))?,
    );
    factor.validate().map_err(|e| e.to_string())
}

fn parse_crop(value: &str) -> Result<CropRegion, String> {
    let parts: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse::<u32>().map_err(|e| format!("{e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, width, height] => Ok(CropRegion::new(x, y, width, height)),
        _ => Err("expected x,y,width,height".into()),
    }
}

fn main() {
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode {
            input,
            output,
            format,
            pixel_format,
            scale,
            layout,
            fast_dct,
            fast_upsample,
            strict,
        } => {
            let mut options = DecodeOptions::default()
                .with_pixel_format(pixel_format.into())
                .with_scaling(scale);
            if fast_dct {
                options.dct_method = jpegtensor_rs::jpeg1::dct::DctMethod::Float;
            }
            options.fast_upsample = fast_upsample;
            options.stop_on_warning = strict;
            decode_image(&input, &output, format, &options, layout)
        }
        Commands::Encode {
            input,
            output,
            width,
            height,
            pixel_format,
            quality,
            subsampling,
            optimize,
            restart_rows,
        } => {
            let options = EncodeOptions {
                quality,
                subsampling: subsampling.into(),
                pixel_format: pixel_format.into(),
                optimize_huffman: optimize,
                restart_interval: restart_rows.map_or(RestartInterval::None, RestartInterval::Rows),
                ..EncodeOptions::default()
            };
            encode_image(&input, &output, width, height, options)
        }
        Commands::Transform {
            input,
            output,
            op,
            crop,
            perfect,
            trim,
            gray,
            copy_none,
        } => {
            let options = TransformOptions {
                perfect,
                trim,
                gray,
                copy_none,
                ..TransformOptions::default()
            };
            let mut transform = Transform::new(op.into()).with_options(options);
            if let Some(region) = crop {
                transform = transform.with_crop(region);
            }
            transform_image(&input, &output, &transform)
        }
        Commands::Info { input } => show_info(&input),
        Commands::ScalingFactors => {
            list_scaling_factors();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn decode_image(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    options: &DecodeOptions,
    layout: LayoutArg,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let codec = JpegCodec::new();

    match format {
        OutputFormat::Npy => {
            let layout = match layout {
                LayoutArg::Hwc => TensorLayout::Hwc,
                LayoutArg::Chw => TensorLayout::Chw,
            };
            let tensor = codec.decode_tensor(&data, options, layout)?;
            let mut file = fs::File::create(output)?;
            tensor.write_npy(&mut file)?;
            println!("✓ Decoded tensor of shape {:?} to {:?}", tensor.shape(), output);
        }
        OutputFormat::Raw | OutputFormat::Ppm => {
            let image = codec.decode(&data, options)?;
            for warning in &image.warnings {
                eprintln!("Warning: {}", warning);
            }
            if matches!(format, OutputFormat::Ppm) {
                if !matches!(image.pixel_format, PixelFormat::Rgb | PixelFormat::Gray) {
                    return Err("PPM output needs the rgb or gray pixel format".into());
                }
                write_ppm(output, &image.data, image.width, image.height, image.pixel_format)?;
            } else {
                fs::write(output, &image.data)?;
            }
            println!(
                "✓ Decoded {}x{} image ({:?}) to {:?}",
                image.width, image.height, image.pixel_format, output
            );
        }
    }
    Ok(())
}

fn encode_image(
    input: &Path,
    output: &Path,
    width: Option<u32>,
    height: Option<u32>,
    mut options: EncodeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let is_pnm = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ppm") || e.eq_ignore_ascii_case("pgm"));

    let (pixels, width, height) = if is_pnm {
        let (pixels, width, height, pixel_format) = read_ppm(&data)?;
        options.pixel_format = pixel_format;
        (pixels, width, height)
    } else {
        let width = width.ok_or("raw input needs --width")?;
        let height = height.ok_or("raw input needs --height")?;
        (data.as_slice(), width, height)
    };

    let encoded = JpegCodec::new().encode(pixels, width, height, 0, &options)?;
    fs::write(output, &encoded)?;
    println!(
        "✓ Encoded {}x{} image to {:?} ({} bytes, quality {})",
        width,
        height,
        output,
        encoded.len(),
        options.quality
    );
    Ok(())
}

fn transform_image(input: &Path, output: &Path, transform: &Transform) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let codec = JpegCodec::new();
    let transformed = codec.transform(&data, transform)?;
    let header = codec.decode_header(&transformed)?;
    fs::write(output, &transformed)?;
    println!(
        "✓ Applied {:?} ({}x{}) to {:?}",
        transform.operation, header.width, header.height, output
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let header = JpegCodec::new().decode_header(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("  Dimensions:  {}x{}", header.width, header.height);
    println!("  Precision:   {} bits", header.precision);
    println!("  Color space: {:?}", header.color_space);
    println!("  Components:  {}", header.component_count());
    match header.subsampling {
        Some(subsampling) => println!("  Subsampling: {:?}", subsampling),
        None => println!("  Subsampling: custom"),
    }
    for component in &header.components {
        println!(
            "    id {:3}  {}x{}  quant table {}",
            component.id, component.h_samp_factor, component.v_samp_factor, component.quant_table_index
        );
    }
    println!("  iMCU:        {}x{}", header.mcu_width, header.mcu_height);
    if header.restart_interval > 0 {
        println!("  Restart:     every {} MCUs", header.restart_interval);
    }
    if let Some(jfif) = header.jfif {
        println!("  JFIF:        {}.{:02}", jfif.version_major, jfif.version_minor);
    }
    if let Some(adobe) = header.adobe {
        println!("  Adobe:       transform {}", adobe.transform);
    }
    Ok(())
}

fn list_scaling_factors() {
    println!("Supported scaling factors:");
    for factor in JpegCodec::new().scaling_factors() {
        println!("  {}", factor);
    }
}

fn write_ppm(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    let mut file = fs::File::create(path)?;

    if pixel_format == PixelFormat::Gray {
        writeln!(file, "P5")?;
    } else {
        writeln!(file, "P6")?;
    }
    writeln!(file, "{} {}", width, height)?;
    writeln!(file, "255")?;
    file.write_all(pixels)?;

    Ok(())
}

/// Parses a binary PPM (P6) or PGM (P5) with maxval 255.
fn read_ppm(data: &[u8]) -> Result<(&[u8], u32, u32, PixelFormat), Box<dyn std::error::Error>> {
    let mut fields = Vec::with_capacity(4);
    let mut position = 0;
    while fields.len() < 4 {
        while position < data.len() && data[position].is_ascii_whitespace() {
            position += 1;
        }
        if data.get(position) == Some(&b'#') {
            while position < data.len() && data[position] != b'\n' {
                position += 1;
            }
            continue;
        }
        let start = position;
        while position < data.len() && !data[position].is_ascii_whitespace() {
            position += 1;
        }
        if start == position {
            return Err("truncated PPM header".into());
        }
        fields.push(std::str::from_utf8(&data[start..position])?);
    }
    // Exactly one whitespace byte separates the header from the samples.
    position += 1;

    let pixel_format = match fields[0] {
        "P6" => PixelFormat::Rgb,
        "P5" => PixelFormat::Gray,
        other => return Err(format!("unsupported PNM type {other}").into()),
    };
    let width: u32 = fields[1].parse()?;
    let height: u32 = fields[2].parse()?;
    if fields[3] != "255" {
        return Err("only 8-bit PPM/PGM is supported".into());
    }
    let size = width as usize * height as usize * pixel_format.pixel_size();
    let pixels = data
        .get(position..position + size)
        .ok_or("PPM pixel data is truncated")?;
    Ok((pixels, width, height, pixel_format))
}
