//! Single-file conversion to AVIF

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use image::codecs::avif::AvifEncoder;
use image::{DynamicImage, ImageEncoder};
use tracing::debug;

use crate::config::{CollisionPolicy, Config, EncoderSettings, OUTPUT_EXTENSION};
use crate::error::{AvifpressError, Result};

/// One unit of work: turn a single source file into its AVIF counterpart.
///
/// Implementations run inside blocking worker threads and must be shareable
/// across them.
pub trait Convert: Send + Sync {
    /// Convert one file, returning (bytes read, bytes written)
    fn convert(&self, path: &Path) -> Result<(u64, u64)>;
}

/// The production converter: decode with the `image` crate, re-encode AVIF.
#[derive(Debug, Clone)]
pub struct Converter {
    settings: EncoderSettings,
    keep_originals: bool,
    on_collision: CollisionPolicy,
}

impl Converter {
    /// Build a converter from run configuration
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.encoder,
            keep_originals: config.keep_originals,
            on_collision: config.on_collision,
        }
    }

    /// Convert a single file
    ///
    /// Steps are commit points in order: read/decode, encode, write the
    /// destination, optionally remove the source. A failure short-circuits
    /// the rest; nothing already written is rolled back, so a failed source
    /// removal still leaves a valid output on disk.
    pub fn convert_file(&self, path: &Path) -> Result<(u64, u64)> {
        let dest = output_path(path);

        if dest == path {
            return Err(AvifpressError::DestinationIsSource {
                path: path.to_path_buf(),
            });
        }

        if self.on_collision == CollisionPolicy::Error && dest.exists() {
            return Err(AvifpressError::DestinationExists { path: dest });
        }

        // Count what the decoder actually consumes, not what stat reports
        let mut reader = CountingReader::new(BufReader::new(File::open(path)?));
        let image = decode(&mut reader)?;
        let bytes_in = reader.bytes_read();

        let encoded = encode_avif(&image, &self.settings)?;
        let bytes_out = encoded.len() as u64;

        std::fs::write(&dest, &encoded)?;

        if !self.keep_originals {
            std::fs::remove_file(path)?;
        }

        debug!(
            "Converted {:?} -> {:?} ({} -> {} bytes)",
            path, dest, bytes_in, bytes_out
        );

        Ok((bytes_in, bytes_out))
    }
}

impl Convert for Converter {
    fn convert(&self, path: &Path) -> Result<(u64, u64)> {
        self.convert_file(path)
    }
}

/// Derive the destination path by swapping the final extension
pub fn output_path(source: &Path) -> PathBuf {
    source.with_extension(OUTPUT_EXTENSION)
}

fn decode(reader: &mut impl Read) -> Result<DynamicImage> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(image::load_from_memory(&data)?)
}

fn encode_avif(image: &DynamicImage, settings: &EncoderSettings) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder =
        AvifEncoder::new_with_speed_quality(&mut buf, settings.speed, settings.effective_quality());

    // The AVIF encoder only accepts RGB(A) pixel buffers
    let rgba = image.to_rgba8();
    encoder.write_image(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        image::ColorType::Rgba8,
    )?;

    Ok(buf)
}

/// Reader adapter counting the bytes pulled through it
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
