//! Operation inputs and outputs.
//!
//! Encoded data flows through [`EncodedImageSource`] and [`EncodedImageSink`];
//! raw pixels through [`Bitmap`] and [`BitmapTarget`].
//!
//! ## Ownership
//!
//! | Constructor | Owned by the operation? | Closed by the operation? |
//! |---|---|---|
//! | `from_path`, `from_bytes`, `owning` | yes | yes, on every exit path |
//! | `from_reader` / `from_writer` | no, borrowed from the caller | never |
//!
//! Owned streams are closed by dropping them. File sinks are flushed before
//! they are dropped so buffered bytes are not silently lost.

use crate::error::{SpectrumError, ValidationError, engine_error, names};
use crate::types::{ImagePixelSpecification, ImageSize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

enum Stream<'a, T: ?Sized + 'a> {
    Owned(Box<T>),
    Borrowed(&'a mut T),
}

impl<'a, T: ?Sized + 'a> Stream<'a, T> {
    fn get(&mut self) -> &mut T {
        match self {
            Stream::Owned(stream) => &mut **stream,
            Stream::Borrowed(stream) => &mut **stream,
        }
    }

    fn is_owned(&self) -> bool {
        matches!(self, Stream::Owned(_))
    }
}

/// Where encoded image bytes are read from.
pub struct EncodedImageSource<'a> {
    stream: Stream<'a, dyn Read + 'a>,
    description: String,
}

impl EncodedImageSource<'static> {
    /// Opens `path` for reading. The file is closed when the operation ends.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self {
            stream: Stream::Owned(Box::new(BufReader::new(file))),
            description: path.display().to_string(),
        })
    }

    /// Reads from an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let description = format!("{} bytes in memory", bytes.len());
        Self {
            stream: Stream::Owned(Box::new(Cursor::new(bytes))),
            description,
        }
    }
}

impl<'a> EncodedImageSource<'a> {
    /// Borrows an open stream. The operation never closes it.
    pub fn from_reader(reader: &'a mut (dyn Read + 'a)) -> Self {
        Self {
            stream: Stream::Borrowed(reader),
            description: "caller stream".to_string(),
        }
    }

    /// Takes ownership of a stream, closing it when the operation ends.
    pub fn owning(reader: impl Read + 'a) -> Self {
        Self {
            stream: Stream::Owned(Box::new(reader)),
            description: "owned stream".to_string(),
        }
    }

    pub fn reader(&mut self) -> &mut (dyn Read + 'a) {
        self.stream.get()
    }

    pub fn is_owned(&self) -> bool {
        self.stream.is_owned()
    }

    /// Releases the source. Owned streams are dropped; borrowed ones are left
    /// untouched.
    pub fn close(self) {
        if self.stream.is_owned() {
            debug!(source = %self.description, "closing source");
        }
    }
}

impl fmt::Debug for EncodedImageSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImageSource")
            .field("description", &self.description)
            .field("owned", &self.is_owned())
            .finish()
    }
}

/// Where encoded image bytes are written to.
pub struct EncodedImageSink<'a> {
    stream: Stream<'a, dyn Write + 'a>,
    description: String,
}

impl EncodedImageSink<'static> {
    /// Creates (or truncates) `path`. The file is flushed and closed when the
    /// operation ends.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self {
            stream: Stream::Owned(Box::new(BufWriter::new(file))),
            description: path.display().to_string(),
        })
    }
}

impl<'a> EncodedImageSink<'a> {
    /// Borrows an open stream, e.g. `&mut Vec<u8>`. The operation never
    /// closes it.
    pub fn from_writer(writer: &'a mut (dyn Write + 'a)) -> Self {
        Self {
            stream: Stream::Borrowed(writer),
            description: "caller stream".to_string(),
        }
    }

    /// Takes ownership of a stream, closing it when the operation ends.
    pub fn owning(writer: impl Write + 'a) -> Self {
        Self {
            stream: Stream::Owned(Box::new(writer)),
            description: "owned stream".to_string(),
        }
    }

    pub fn writer(&mut self) -> &mut (dyn Write + 'a) {
        self.stream.get()
    }

    pub fn is_owned(&self) -> bool {
        self.stream.is_owned()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.stream.get().flush()
    }

    /// Releases the sink. Owned streams are flushed and dropped; a flush
    /// failure at this point is logged, not returned.
    pub fn close(mut self) {
        if self.stream.is_owned() {
            debug!(sink = %self.description, "closing sink");
            if let Err(e) = self.stream.get().flush() {
                warn!(sink = %self.description, error = %e, "failed to flush sink on close");
            }
        }
    }
}

impl fmt::Debug for EncodedImageSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImageSink")
            .field("description", &self.description)
            .field("owned", &self.is_owned())
            .finish()
    }
}

/// Raw pixel data.
///
/// The buffer always holds exactly `width * height * bytes_per_pixel` bytes,
/// rows top to bottom without padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    size: ImageSize,
    pixel_specification: ImagePixelSpecification,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(
        size: ImageSize,
        pixel_specification: ImagePixelSpecification,
        pixels: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let expected = size.pixel_count() * pixel_specification.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(ValidationError::BitmapLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            size,
            pixel_specification,
            pixels,
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn pixel_specification(&self) -> ImagePixelSpecification {
        self.pixel_specification
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.size.height() {
            return None;
        }
        let stride = self.size.width() as usize * self.pixel_specification.bytes_per_pixel();
        let start = y as usize * stride;
        self.pixels.get(start..start + stride)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("size", &self.size)
            .field("pixel_specification", &self.pixel_specification)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Receives the bitmap produced by a decode or transform.
///
/// Filled at most once per operation.
#[derive(Debug, Default)]
pub struct BitmapTarget {
    bitmap: Option<Bitmap>,
}

impl BitmapTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the engine's output. Fails when the target is already filled.
    pub fn set(&mut self, bitmap: Bitmap) -> Result<(), SpectrumError> {
        if self.bitmap.is_some() {
            return Err(engine_error!(
                names::INVALID_BITMAP,
                "bitmap target was already filled"
            ));
        }
        self.bitmap = Some(bitmap);
        Ok(())
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    pub fn take(&mut self) -> Option<Bitmap> {
        self.bitmap.take()
    }

    pub fn is_filled(&self) -> bool {
        self.bitmap.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn source_from_bytes_reads_everything() {
        let mut source = EncodedImageSource::from_bytes(vec![1, 2, 3]);
        let mut buf = Vec::new();
        source.reader().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert!(source.is_owned());
    }

    #[test]
    fn borrowed_source_is_not_owned() {
        let mut cursor = Cursor::new(vec![9u8; 4]);
        let source = EncodedImageSource::from_reader(&mut cursor);
        assert!(!source.is_owned());
        source.close();
        // Still usable by the caller
        let mut buf = Vec::new();
        cursor.read_to_end(&mut buf).unwrap();
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn source_from_missing_path_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(EncodedImageSource::from_path(tmp.path().join("missing.jpg")).is_err());
    }

    #[test]
    fn file_sink_is_flushed_on_close() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        let mut sink = EncodedImageSink::from_path(&path).unwrap();
        sink.writer().write_all(b"spectrum").unwrap();
        sink.close();
        assert_eq!(std::fs::read(&path).unwrap(), b"spectrum");
    }

    #[test]
    fn borrowed_sink_writes_into_caller_buffer() {
        let mut out = Vec::new();
        {
            let mut sink = EncodedImageSink::from_writer(&mut out);
            sink.writer().write_all(&[7, 7]).unwrap();
            sink.close();
        }
        assert_eq!(out, vec![7, 7]);
    }

    #[test]
    fn bitmap_validates_buffer_length() {
        let size = ImageSize::new(2, 2).unwrap();
        assert!(Bitmap::new(size, ImagePixelSpecification::Rgb, vec![0; 12]).is_ok());
        assert!(matches!(
            Bitmap::new(size, ImagePixelSpecification::Rgba, vec![0; 12]),
            Err(ValidationError::BitmapLength {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn bitmap_rows() {
        let size = ImageSize::new(2, 2).unwrap();
        let bitmap =
            Bitmap::new(size, ImagePixelSpecification::Gray, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(bitmap.row(1), Some(&[3u8, 4][..]));
        assert_eq!(bitmap.row(2), None);
    }

    #[test]
    fn bitmap_target_is_filled_once() {
        let bitmap = Bitmap::new(
            ImageSize::new(1, 1).unwrap(),
            ImagePixelSpecification::Gray,
            vec![0],
        )
        .unwrap();
        let mut target = BitmapTarget::new();
        target.set(bitmap.clone()).unwrap();
        let err = target.set(bitmap.clone()).unwrap_err();
        assert!(err.is(names::INVALID_BITMAP));
        assert_eq!(target.take(), Some(bitmap));
        assert!(!target.is_filled());
    }
}
