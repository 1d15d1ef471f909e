//! Validation and execution template shared by every transform.
//!
//! A transform implements [`ImageTransform::compute`] and optionally the
//! validation and pre/post-processing hooks. [`ImageTransform::transform`]
//! wraps them:
//! 1. Reject missing image or options (`NullInput`)
//! 2. Check dimensions, channel count and buffer layout (`IncompatibleImage`)
//! 3. Run the transform's own `validate` hook
//! 4. Run `pre_process`, `compute`, `post_process` inside a panic boundary
//! 5. Check the produced image against the transform's declared output
//!
//! Every error leaving this module carries the transform name and step.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::cache::ArrayCache;
use crate::error::{ErrorKind, Step, TransformError, TransformResult};
use crate::image::{DataType, Image};
use crate::options::TransformOptions;

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 65_536;

/// Largest accepted channel count.
pub const MAX_CHANNELS: usize = 16;

/// A stateless per-image transform.
pub trait ImageTransform: Send + Sync {
    /// Stable name reported in errors and logs.
    fn name(&self) -> &'static str;

    /// Minimum channel count of the source image.
    fn required_channels(&self) -> usize {
        1
    }

    /// Channel count of the produced image. Most visual transforms emit 3.
    fn output_channels(&self, source: &Image) -> usize {
        let _ = source;
        3
    }

    /// Transform-specific checks, run before any pixel work.
    fn validate(&self, source: &Image, options: &TransformOptions) -> TransformResult<()> {
        let _ = (source, options);
        Ok(())
    }

    /// Hook run before `compute`.
    fn pre_process(&self, source: &Image, options: &TransformOptions) -> TransformResult<()> {
        let _ = (source, options);
        Ok(())
    }

    /// The algorithm. Must not mutate `source`.
    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image>;

    /// Hook run on the output of `compute`, e.g. for rescaling.
    fn post_process(&self, output: Image, options: &TransformOptions) -> TransformResult<Image> {
        let _ = options;
        Ok(output)
    }

    /// Validate, run and check this transform.
    fn transform(
        &self,
        source: Option<&Image>,
        options: Option<&TransformOptions>,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        execute(self, source, options, cache)
    }
}

/// The template behind [`ImageTransform::transform`].
pub fn execute<T: ImageTransform + ?Sized>(
    transform: &T,
    source: Option<&Image>,
    options: Option<&TransformOptions>,
    cache: &ArrayCache,
) -> TransformResult<Image> {
    let name = transform.name();
    let source = source
        .ok_or_else(|| {
            TransformError::null_input("source image is missing").within(name, Step::Validate)
        })?;
    let options = options
        .ok_or_else(|| {
            TransformError::null_input("options are missing").within(name, Step::Validate)
        })?;

    check_source(transform, source).map_err(|e| e.within(name, Step::Validate))?;
    transform
        .validate(source, options)
        .map_err(|e| e.within(name, Step::Validate))?;

    tracing::debug!(
        "{name}: {}x{} x{} ({})",
        source.width(),
        source.height(),
        source.channel_count(),
        source.data_type()
    );

    guarded(name, Step::PreProcess, || transform.pre_process(source, options))?;
    let output = guarded(name, Step::Compute, || transform.compute(source, options, cache))?;
    let output = guarded(name, Step::PostProcess, || transform.post_process(output, options))?;

    check_output(transform, source, &output).map_err(|e| e.within(name, Step::Result))?;
    Ok(output)
}

fn check_source<T: ImageTransform + ?Sized>(transform: &T, source: &Image) -> TransformResult<()> {
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TransformError::incompatible(format!(
            "{width}x{height} is outside 1..={MAX_DIMENSION}"
        )));
    }

    let channels = source.channel_count();
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(TransformError::incompatible(format!(
            "{channels} channels is outside 1..={MAX_CHANNELS}"
        )));
    }
    source
        .check_layout()
        .map_err(|e| TransformError::incompatible(e.to_string()))?;

    let required = transform.required_channels();
    if channels < required {
        return Err(TransformError::incompatible(format!(
            "needs at least {required} channels, image has {channels}"
        )));
    }
    Ok(())
}

fn check_output<T: ImageTransform + ?Sized>(
    transform: &T,
    source: &Image,
    output: &Image,
) -> TransformResult<()> {
    if output.width() != source.width() || output.height() != source.height() {
        return Err(TransformError::algorithm(format!(
            "produced {}x{} from a {}x{} source",
            output.width(),
            output.height(),
            source.width(),
            source.height()
        )));
    }

    let expected = transform.output_channels(source);
    if output.channel_count() != expected {
        return Err(TransformError::algorithm(format!(
            "produced {} channels, expected {expected}",
            output.channel_count()
        )));
    }

    if let Some((c, buf)) = output
        .channels()
        .iter()
        .enumerate()
        .find(|(_, buf)| buf.len() != output.pixel_count())
    {
        return Err(TransformError::algorithm(format!(
            "channel {c} holds {} samples, expected {}",
            buf.len(),
            output.pixel_count()
        )));
    }
    Ok(())
}

/// Run one phase, converting panics into `AlgorithmFailure`.
fn guarded<R>(
    name: &'static str,
    step: Step,
    phase: impl FnOnce() -> TransformResult<R>,
) -> TransformResult<R> {
    match panic::catch_unwind(AssertUnwindSafe(phase)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            if err.kind == ErrorKind::AlgorithmFailure {
                tracing::warn!("{name}: {step} failed: {}", err.message);
            }
            Err(err.within(name, step))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!("{name}: {step} panicked: {message}");
            Err(TransformError::algorithm(message).within(name, step))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Build a 3-channel output from three `f64` planes.
pub(crate) fn emit_planes(
    source: &Image,
    data_type: DataType,
    planes: &[Vec<f64>],
) -> TransformResult<Image> {
    Ok(Image::from_f64_planes(source.width(), source.height(), data_type, planes)?)
}

/// Build a 3-channel output from one computed plane.
///
/// With `replicate` the plane fills all three channels; otherwise channels
/// 1 and 2 are zero.
pub(crate) fn emit_single(
    source: &Image,
    data_type: DataType,
    plane: Vec<f64>,
    replicate: bool,
) -> TransformResult<Image> {
    let others = if replicate {
        plane.clone()
    } else {
        vec![0.0; plane.len()]
    };
    emit_planes(source, data_type, &[plane, others.clone(), others])
}
