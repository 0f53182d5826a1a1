use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use spectrum::config::{self, Configuration};
use spectrum::io::{BitmapTarget, EncodedImageSink, EncodedImageSource};
use spectrum::logging::TracingLogger;
use spectrum::options::{DecodeOptions, TranscodeOptions};
use spectrum::output::{self, BatchEvent};
use spectrum::plugins::{GifPlugin, SpectrumPlugin};
use spectrum::requirements::{
    CropRequirement, EncodeMode, EncodeRequirement, ResizeMode, ResizeRequirement,
    RotateRequirement,
};
use spectrum::types::{EncodedImageFormat, ImagePixelSpecification, ImageSize};
use spectrum::error::SpectrumError;
use spectrum::result::SpectrumResult;
use spectrum::{ImageOperations, Spectrum, wire};
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "spectrum")]
#[command(about = "Decode, transcode and transform images")]
#[command(long_about = "\
Decode, transcode and transform images

Every operation is described by typed options: a target encoding plus
optional resize, crop and rotate requirements. The engine picks a rule that
satisfies them and reports it:

  copy      input bytes copied verbatim (same format, nothing to change)
  image_rs  decoded, transformed and re-encoded

Transformations run in a fixed order: crop, resize, rotate/flip.
Resizing never upscales and keeps the aspect ratio.

Global codec settings are read from spectrum.toml in the working directory
(or --config). Run 'spectrum gen-config' for a documented file.

Set RUST_LOG=spectrum=debug to see the operation lifecycle.")]
#[command(version = version_string())]
struct Cli {
    /// Global configuration file
    #[arg(long, default_value = "spectrum.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode one image, optionally cropping, resizing and rotating it
    Transcode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
        #[command(flatten)]
        transform: TransformArgs,
        /// Read the complete transcode options from a JSON file instead
        #[arg(long)]
        options: Option<PathBuf>,
    },
    /// Decode one image into raw pixels
    Decode {
        input: PathBuf,
        output: PathBuf,
        /// Pixel layout of the raw output
        #[arg(long, value_enum, default_value = "rgba")]
        pixel: PixelArg,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// Transcode every image below a directory in parallel
    Batch {
        source: PathBuf,
        output_dir: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
        #[command(flatten)]
        transform: TransformArgs,
        /// Worker threads (capped at the number of cores)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print a stock spectrum.toml with all options documented
    GenConfig,
    /// Print the transcode options the given flags resolve to, as JSON
    Options {
        #[command(flatten)]
        encode: EncodeArgs,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// List the supported image formats
    Formats,
}

#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Output format (jpeg, png, webp, gif)
    #[arg(long, default_value = "jpeg")]
    format: String,
    /// Quality 1-100; 0 lets the encoder decide
    #[arg(long, default_value_t = 0)]
    quality: u8,
    #[arg(long, value_enum, default_value = "any")]
    mode: ModeArg,
}

#[derive(clap::Args, Clone, Default)]
struct TransformArgs {
    /// Resize target box, e.g. 480x320
    #[arg(long, value_parser = parse_size)]
    resize: Option<ImageSize>,
    #[arg(long, value_enum, default_value = "exact")]
    resize_mode: ResizeModeArg,
    /// Absolute crop region left,top,right,bottom in pixels
    #[arg(long, value_parser = parse_crop)]
    crop: Option<[u32; 4]>,
    /// Fail instead of approximating the crop region
    #[arg(long)]
    exact_crop: bool,
    /// Clockwise rotation in degrees (multiple of 90)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    rotate: i32,
    #[arg(long)]
    flip_h: bool,
    #[arg(long)]
    flip_v: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum ModeArg {
    Lossless,
    Lossy,
    Any,
}

impl From<ModeArg> for EncodeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lossless => EncodeMode::Lossless,
            ModeArg::Lossy => EncodeMode::Lossy,
            ModeArg::Any => EncodeMode::Any,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Default)]
enum ResizeModeArg {
    #[default]
    Exact,
    ExactOrSmaller,
    ExactOrLarger,
}

impl From<ResizeModeArg> for ResizeMode {
    fn from(mode: ResizeModeArg) -> Self {
        match mode {
            ResizeModeArg::Exact => ResizeMode::Exact,
            ResizeModeArg::ExactOrSmaller => ResizeMode::ExactOrSmaller,
            ResizeModeArg::ExactOrLarger => ResizeMode::ExactOrLarger,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum PixelArg {
    Rgb,
    Rgba,
    Gray,
    GrayA,
    AGray,
    Argb,
    Bgr,
    Bgra,
    Abgr,
}

impl From<PixelArg> for ImagePixelSpecification {
    fn from(pixel: PixelArg) -> Self {
        match pixel {
            PixelArg::Rgb => ImagePixelSpecification::Rgb,
            PixelArg::Rgba => ImagePixelSpecification::Rgba,
            PixelArg::Gray => ImagePixelSpecification::Gray,
            PixelArg::GrayA => ImagePixelSpecification::GrayA,
            PixelArg::AGray => ImagePixelSpecification::AGray,
            PixelArg::Argb => ImagePixelSpecification::Argb,
            PixelArg::Bgr => ImagePixelSpecification::Bgr,
            PixelArg::Bgra => ImagePixelSpecification::Bgra,
            PixelArg::Abgr => ImagePixelSpecification::Abgr,
        }
    }
}

fn parse_size(value: &str) -> Result<ImageSize, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width.trim().parse().map_err(|e| format!("width: {e}"))?;
    let height: u32 = height.trim().parse().map_err(|e| format!("height: {e}"))?;
    ImageSize::new(width, height).map_err(|e| e.to_string())
}

fn parse_crop(value: &str) -> Result<[u32; 4], String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<u32>().map_err(|e| format!("'{part}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    <[u32; 4]>::try_from(parts)
        .map_err(|parts| format!("expected left,top,right,bottom, got {} values", parts.len()))
}

impl EncodeArgs {
    fn requirement(&self) -> CliResult<EncodeRequirement> {
        let format = EncodedImageFormat::new(&self.format)?;
        Ok(EncodeRequirement::new(format, u32::from(self.quality), self.mode.into())?)
    }
}

impl TransformArgs {
    fn resize(&self) -> CliResult<Option<ResizeRequirement>> {
        self.resize
            .map(|size| ResizeRequirement::new(self.resize_mode.into(), size))
            .transpose()
            .map_err(Into::into)
    }

    fn crop(&self) -> CliResult<Option<CropRequirement>> {
        self.crop
            .map(|[left, top, right, bottom]| {
                CropRequirement::absolute(left, top, right, bottom, self.exact_crop)
            })
            .transpose()
            .map_err(Into::into)
    }

    fn rotate(&self) -> Option<RotateRequirement> {
        (self.rotate != 0 || self.flip_h || self.flip_v)
            .then(|| RotateRequirement::new(self.rotate).with_flips(self.flip_h, self.flip_v))
    }
}

fn transcode_options(encode: &EncodeArgs, transform: &TransformArgs) -> CliResult<TranscodeOptions> {
    let mut builder = TranscodeOptions::builder(encode.requirement()?);
    if let Some(resize) = transform.resize()? {
        builder = builder.resize(resize);
    }
    if let Some(crop) = transform.crop()? {
        builder = builder.crop(crop);
    }
    if let Some(rotate) = transform.rotate() {
        builder = builder.rotate(rotate);
    }
    Ok(builder.build())
}

fn decode_options(pixel: PixelArg, transform: &TransformArgs) -> CliResult<DecodeOptions> {
    let mut builder = DecodeOptions::builder().output_pixel_specification(pixel.into());
    if let Some(resize) = transform.resize()? {
        builder = builder.resize(resize);
    }
    if let Some(crop) = transform.crop()? {
        builder = builder.crop(crop);
    }
    if let Some(rotate) = transform.rotate() {
        builder = builder.rotate(rotate);
    }
    Ok(builder.build())
}

fn build_spectrum(config_path: &Path) -> CliResult<Spectrum> {
    let configuration: Configuration = config::load_config_or_empty(config_path)?;
    let plugins: Vec<Arc<dyn SpectrumPlugin>> = vec![Arc::new(GifPlugin)];
    Ok(Spectrum::new(
        configuration,
        plugins,
        Arc::new(TracingLogger::default()),
    ))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spectrum=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Transcode {
            input,
            output,
            encode,
            transform,
            options,
        } => {
            let options = match options {
                Some(path) => wire::load_json::<TranscodeOptions>(&path)?,
                None => transcode_options(&encode, &transform)?,
            };
            let spectrum = build_spectrum(&cli.config)?;
            let (label_in, label_out) = (input.display().to_string(), output.display().to_string());
            match transcode_to_path(&spectrum, &input, &output, &options, &"cli transcode")? {
                Ok(result) => output::print_result(&label_in, Some(&label_out), &result),
                Err(err) => {
                    output::print_error(&label_in, Some(&label_out), &err);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Decode {
            input,
            output,
            pixel,
            transform,
        } => {
            let options = decode_options(pixel, &transform)?;
            let spectrum = build_spectrum(&cli.config)?;
            let (label_in, label_out) = (input.display().to_string(), output.display().to_string());
            let mut target = BitmapTarget::new();
            match spectrum.decode(
                EncodedImageSource::from_path(&input)?,
                &mut target,
                &options,
                &"cli decode",
            ) {
                Ok(result) => {
                    if let Some(bitmap) = target.take() {
                        std::fs::write(&output, bitmap.into_pixels())?;
                    }
                    output::print_result(&label_in, Some(&label_out), &result);
                }
                Err(err) => {
                    output::print_error(&label_in, Some(&label_out), &err);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Batch {
            source,
            output_dir,
            encode,
            transform,
            threads,
        } => {
            init_thread_pool(threads);
            let options = transcode_options(&encode, &transform)?;
            let spectrum = build_spectrum(&cli.config)?;
            let (succeeded, total) = run_batch(&spectrum, &source, &output_dir, &options)?;
            println!("{}", output::format_batch_summary(succeeded, total));
            if succeeded < total {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Options { encode, transform } => {
            let options = transcode_options(&encode, &transform)?;
            println!("{}", wire::to_json_pretty(&options)?);
        }
        Command::Formats => {
            let spectrum = build_spectrum(&cli.config)?;
            output::print_formats(&spectrum.supported_formats());
        }
    }

    Ok(ExitCode::SUCCESS)
}

const BATCH_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

fn extension_for(format: &EncodedImageFormat) -> &str {
    if *format == EncodedImageFormat::JPEG {
        "jpg"
    } else {
        format.identifier()
    }
}

/// Images below `source`, sorted so batch output is stable.
fn collect_images(source: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| BATCH_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    images.sort();
    images
}

/// Transcodes every image below `source` into `output_dir`, keeping the
/// relative layout. Returns `(succeeded, total)`.
fn run_batch(
    spectrum: &Spectrum,
    source: &Path,
    output_dir: &Path,
    options: &TranscodeOptions,
) -> CliResult<(usize, usize)> {
    let images = collect_images(source);
    let extension = extension_for(options.encode_requirement().format());
    let succeeded = AtomicUsize::new(0);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_batch_event(&event) {
                println!("{}", line);
            }
        }
    });

    tx.send(BatchEvent::Started {
        image_count: images.len(),
    })?;

    images
        .par_iter()
        .enumerate()
        .for_each_with(tx, |tx, (index, path)| {
            let relative = path.strip_prefix(source).unwrap_or(path);
            let target = output_dir.join(relative).with_extension(extension);
            let event = match transcode_one(spectrum, path, &target, options) {
                Ok(result) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                    BatchEvent::Transcoded {
                        index: index + 1,
                        source: relative.display().to_string(),
                        target: target.display().to_string(),
                        result,
                    }
                }
                Err(error) => BatchEvent::Failed {
                    index: index + 1,
                    source: relative.display().to_string(),
                    error,
                },
            };
            // The printer drains until every sender is dropped.
            let _ = tx.send(event);
        });

    printer
        .join()
        .map_err(|_| "batch printer thread panicked")?;
    Ok((succeeded.into_inner(), images.len()))
}

/// Transcodes `input` into a temporary file next to `output` and moves it
/// into place only on success. A failed operation leaves `output` untouched.
///
/// The outer error covers the files themselves, the inner one the operation.
fn transcode_to_path(
    spectrum: &Spectrum,
    input: &Path,
    output: &Path,
    options: &TranscodeOptions,
    caller_context: &dyn fmt::Debug,
) -> CliResult<Result<SpectrumResult, SpectrumError>> {
    let dir = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let source = EncodedImageSource::from_path(input)?;
    let mut staged = BufWriter::new(tempfile::NamedTempFile::new_in(dir)?);

    let result = spectrum.transcode(
        source,
        EncodedImageSink::from_writer(&mut staged),
        options,
        caller_context,
    );
    if result.is_ok() {
        staged.flush()?;
        let file = staged.into_inner().map_err(|e| e.into_error())?;
        file.persist(output)?;
    }
    Ok(result)
}

fn transcode_one(
    spectrum: &Spectrum,
    input: &Path,
    target: &Path,
    options: &TranscodeOptions,
) -> Result<SpectrumResult, String> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    transcode_to_path(spectrum, input, target, options, &input.display())
        .map_err(|e| e.to_string())?
        .map_err(|err| match err.name() {
            Some(name) => format!("{name}: {}", err.message()),
            None => err.message().to_string(),
        })
}

/// Initialize the rayon thread pool.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(threads: Option<usize>) {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = threads.map_or(cores, |t| t.clamp(1, cores));
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
