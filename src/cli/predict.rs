// yolo-detect 🚀 AGPL-3.0 License

use std::path::Path;
use std::process;

use crate::cli::args::PredictArgs;
use crate::results::{Detection, Speed, summarize};
use crate::sink::HttpSink;
use crate::source::{collect_images, load_image};
use crate::{DetectOutcome, Detector, DetectorConfig, OnnxEngine, VERSION};
use crate::{error, section, success, verbose, warn};

/// Build the detector configuration from command-line arguments.
pub fn config_from_args(args: &PredictArgs) -> DetectorConfig {
    DetectorConfig::new()
        .with_target_size(args.imgsz)
        .with_num_classes(args.num_classes)
        .with_box_format(args.box_format)
        .with_confidence(args.conf)
        .with_iou(args.iou)
        .with_max_detections(args.max_det)
        .with_threads(args.threads)
}

/// Run YOLO detection over every image of the source.
///
/// Exits the process with code 1 if the configuration, source or model is
/// unusable. Per-image failures are reported and skipped.
#[allow(clippy::cast_precision_loss)]
pub fn run_prediction(args: &PredictArgs) {
    let config = config_from_args(args);
    if let Err(e) = config.validate() {
        error!("{e}");
        process::exit(1);
    }

    let paths = match collect_images(&args.source) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Error reading source: {e}");
            process::exit(1);
        }
    };
    if paths.is_empty() {
        warn!("No images found in {}", args.source);
        return;
    }

    let engine = match OnnxEngine::load(&args.model, &config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Error loading model: {e}");
            process::exit(1);
        }
    };

    let target_size = config.target_size;
    let summary = format!(
        "{} summary: {} classes, imgsz={target_size}, boxes={}, conf={}, iou={}",
        args.model,
        config.num_classes,
        config.box_format,
        config.confidence_threshold,
        config.iou_threshold
    );

    let detector = match Detector::new(engine, config) {
        Ok(detector) => detector,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let sink = args.upload_url.as_deref().map(HttpSink::new);

    println!("yolo-detect {VERSION} 🚀 Rust ONNX Runtime");
    verbose!("{summary}");
    if let Some(sink) = &sink {
        verbose!("Uploading results to {}", sink.url());
    }
    verbose!("");

    let total = paths.len();
    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut uploaded = 0usize;
    let mut totals = Speed::new(0.0, 0.0, 0.0);

    for (i, path) in paths.iter().enumerate() {
        let image = match load_image(path) {
            Ok(image) => image,
            Err(e) => {
                error!("{e}");
                failed += 1;
                continue;
            }
        };

        let (outcome, delivery) = match &sink {
            Some(sink) => detector.detect_and_report(&image, sink),
            None => (detector.detect(&image), None),
        };

        if let Some(e) = outcome.error() {
            warn!("{}: {e}", path.display());
            failed += 1;
            continue;
        }
        match delivery {
            Some(Ok(())) => uploaded += 1,
            Some(Err(e)) => {
                warn!("Upload failed for {}: {e}", path.display());
            }
            None => {}
        }

        if args.json {
            print_json(path, &outcome.detections);
        } else {
            verbose!(
                "image {}/{} {}: {}x{} {}, {:.1}ms",
                i + 1,
                total,
                path.display(),
                image.width(),
                image.height(),
                summarize(&outcome.detections),
                outcome.speed.inference.unwrap_or(0.0)
            );
        }

        accumulate(&mut totals, &outcome);
        processed += 1;
    }

    let n = processed.max(1) as f64;
    section!("Results");
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image \
         at shape (1, 3, {target_size}, {target_size})",
        totals.preprocess.unwrap_or(0.0) / n,
        totals.inference.unwrap_or(0.0) / n,
        totals.postprocess.unwrap_or(0.0) / n,
    );
    if sink.is_some() {
        verbose!("Uploaded {uploaded}/{processed} results");
    }
    if failed > 0 {
        warn!("{failed}/{total} images failed");
    } else {
        success!("Processed {processed} images");
    }
}

fn accumulate(totals: &mut Speed, outcome: &DetectOutcome) {
    let add = |total: &mut Option<f64>, value: Option<f64>| {
        *total = Some(total.unwrap_or(0.0) + value.unwrap_or(0.0));
    };
    add(&mut totals.preprocess, outcome.speed.preprocess);
    add(&mut totals.inference, outcome.speed.inference);
    add(&mut totals.postprocess, outcome.speed.postprocess);
}

/// Print one JSON line: `{"source": ..., "detections": [...]}`.
fn print_json(path: &Path, detections: &[Detection]) {
    let line = serde_json::json!({
        "source": path.display().to_string(),
        "detections": detections,
    });
    println!("{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::format::BoxFormat;
    use clap::Parser;

    #[test]
    fn test_config_from_args() {
        let cli = Cli::parse_from([
            "app",
            "predict",
            "-s",
            "x.jpg",
            "--imgsz",
            "640",
            "--box-format",
            "xywh",
            "--max-det",
            "10",
            "--threads",
            "2",
        ]);
        let Commands::Predict(args) = cli.command;
        let config = config_from_args(&args);

        assert_eq!(config.target_size, 640);
        assert_eq!(config.box_format, BoxFormat::CenterSize);
        assert_eq!(config.max_detections, 10);
        assert_eq!(config.num_threads, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_accumulate() {
        let mut totals = Speed::new(0.0, 0.0, 0.0);
        let outcome = DetectOutcome {
            detections: Vec::new(),
            speed: Speed::new(1.0, 2.0, 3.0),
            status: crate::DetectStatus::Completed,
        };
        accumulate(&mut totals, &outcome);
        accumulate(&mut totals, &outcome);
        assert!((totals.total() - 12.0).abs() < 1e-9);
    }
}
