//! Raster-to-vector tracing service
//! Drives an external `potrace` process to turn uploaded raster images into
//! SVG outlines. The crate never traces pixels itself; it decodes the upload
//! to a grayscale bitmap, pipes it to the tracer binary, and collects the
//! SVG from stdout.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::GrayImage;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Tracer configuration.
///
/// `threshold` is the black level in the 0..1 range (0.5 matches the
/// historical 128/255 default), `turd_size` suppresses speckles up to that
/// many pixels, and `opt_tolerance` controls curve optimization.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub binary: PathBuf,
    pub threshold: f32,
    pub turd_size: u32,
    pub opt_tolerance: f32,
    pub posterize_steps: u8,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("potrace"),
            threshold: 0.5,
            turd_size: 2,
            opt_tolerance: 0.2,
            posterize_steps: 4,
        }
    }
}

/// Image vectorizer backed by an external tracer process.
#[derive(Debug, Clone)]
pub struct Tracer {
    config: TracerConfig,
}

impl Tracer {
    pub fn new(config: TracerConfig) -> Self {
        Self { config }
    }

    /// Decode a base64 image payload into raw bytes.
    pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
        BASE64
            .decode(data.trim())
            .context("image payload is not valid base64")
    }

    /// Trace a raster image into a monochrome SVG.
    pub async fn trace(&self, image_bytes: &[u8]) -> Result<String> {
        let bitmap = decode_to_pgm(image_bytes)?;
        self.run_pass(&bitmap, self.config.threshold).await
    }

    /// Trace a raster image into a posterized multi-layer SVG.
    ///
    /// Runs one pass per threshold step and stacks the resulting path layers
    /// into a single document, darkest layer last.
    pub async fn posterize(&self, image_bytes: &[u8]) -> Result<String> {
        let steps = self.config.posterize_steps.max(2);
        let bitmap = decode_to_pgm(image_bytes)?;

        let mut layers = Vec::with_capacity(steps as usize);
        for step in 1..=steps {
            let threshold = step as f32 / (steps as f32 + 1.0);
            let svg = self.run_pass(&bitmap, threshold).await?;
            layers.push(svg);
        }

        stack_layers(&layers)
    }

    async fn run_pass(&self, bitmap: &[u8], threshold: f32) -> Result<String> {
        let args = build_args(&self.config, threshold);

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!("failed to start tracer binary {}", self.config.binary.display())
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("tracer stdin was not captured"))?;
        stdin.write_all(bitmap).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tracer exited with {}: {}", output.status, stderr.trim()));
        }

        let svg = String::from_utf8(output.stdout).context("tracer produced non-UTF-8 output")?;
        if !svg.contains("<svg") {
            return Err(anyhow!("tracer output did not contain an SVG document"));
        }
        Ok(svg)
    }
}

/// Arguments for one tracer pass: SVG backend, stdout output, stdin input.
fn build_args(config: &TracerConfig, threshold: f32) -> Vec<String> {
    vec![
        "--svg".to_string(),
        "--output".to_string(),
        "-".to_string(),
        "--blacklevel".to_string(),
        format!("{:.3}", threshold),
        "--turdsize".to_string(),
        config.turd_size.to_string(),
        "--opttolerance".to_string(),
        format!("{:.3}", config.opt_tolerance),
        "-".to_string(),
    ]
}

/// Decode an uploaded image (PNG, JPEG, GIF, BMP, ...) and re-encode it as a
/// binary PGM bitmap, the format the tracer reads from stdin.
fn decode_to_pgm(image_bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(image_bytes).context("could not decode image data")?;
    Ok(gray_to_pgm(&decoded.to_luma8()))
}

fn gray_to_pgm(gray: &GrayImage) -> Vec<u8> {
    let header = format!("P5\n{} {}\n255\n", gray.width(), gray.height());
    let mut out = Vec::with_capacity(header.len() + gray.as_raw().len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(gray.as_raw());
    out
}

/// Stack several single-layer SVG documents into one.
///
/// Keeps the first document's header and closes it after the concatenated
/// bodies. Each body is wrapped in a group with stepped opacity so lighter
/// layers stay visible underneath darker ones.
fn stack_layers(layers: &[String]) -> Result<String> {
    let body_pattern = Regex::new(r"(?s)(<svg[^>]*>)(.*)</svg>").unwrap();

    let first = layers
        .first()
        .ok_or_else(|| anyhow!("no layers to stack"))?;
    let header = body_pattern
        .captures(first)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| anyhow!("unrecognized SVG structure in tracer output"))?
        .as_str()
        .to_string();

    let mut stacked = header;
    for (idx, layer) in layers.iter().enumerate() {
        let body = body_pattern
            .captures(layer)
            .and_then(|caps| caps.get(2))
            .ok_or_else(|| anyhow!("unrecognized SVG structure in tracer output"))?
            .as_str();
        let opacity = (idx + 1) as f32 / layers.len() as f32;
        stacked.push_str(&format!(
            "<g fill-opacity=\"{:.3}\">{}</g>",
            opacity, body
        ));
    }
    stacked.push_str("</svg>");
    Ok(stacked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_shape() {
        let config = TracerConfig::default();
        let args = build_args(&config, 0.5);
        assert_eq!(args[0], "--svg");
        assert!(args.contains(&"--blacklevel".to_string()));
        assert!(args.contains(&"0.500".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_gray_to_pgm_header_and_pixels() {
        let gray = GrayImage::from_raw(2, 1, vec![0u8, 255u8]).unwrap();
        let pgm = gray_to_pgm(&gray);
        assert!(pgm.starts_with(b"P5\n2 1\n255\n"));
        assert_eq!(&pgm[pgm.len() - 2..], &[0u8, 255u8]);
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert!(Tracer::decode_payload("not base64 at all!!!").is_err());
        assert!(Tracer::decode_payload("aGVsbG8=").is_ok());
    }

    #[test]
    fn test_stack_layers_merges_bodies() {
        let layers = vec![
            "<svg width=\"10\"><path d=\"M0 0\"/></svg>".to_string(),
            "<svg width=\"10\"><path d=\"M1 1\"/></svg>".to_string(),
        ];
        let stacked = stack_layers(&layers).unwrap();
        assert!(stacked.starts_with("<svg width=\"10\">"));
        assert!(stacked.contains("M0 0"));
        assert!(stacked.contains("M1 1"));
        assert!(stacked.ends_with("</svg>"));
        assert_eq!(stacked.matches("<g fill-opacity").count(), 2);
    }

    #[test]
    fn test_stack_layers_rejects_non_svg() {
        let layers = vec!["not svg".to_string()];
        assert!(stack_layers(&layers).is_err());
    }
}
