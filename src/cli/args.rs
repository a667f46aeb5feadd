// yolo-detect 🚀 AGPL-3.0 License

use clap::{Args, Parser, Subcommand};

use crate::format::BoxFormat;
use crate::inference::{DEFAULT_NUM_CLASSES, DEFAULT_TARGET_SIZE};

/// Default model file name.
pub const DEFAULT_MODEL: &str = "best.onnx";

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Predict Options:
    --model, -m <MODEL>        Path to ONNX model file [default: best.onnx]
    --source, -s <SOURCE>      Image file or directory of images
    --conf <CONF>              Confidence threshold [default: 0.25]
    --iou <IOU>                IoU threshold for NMS [default: 0.45]
    --imgsz <IMGSZ>            Square model input size [default: 512]
    --num-classes <N>          Number of classes predicted by the model [default: 5]
    --box-format <FORMAT>      Box encoding of the raw output: xyxy or xywh [default: xyxy]
    --max-det <N>              Maximum detections per image [default: 300]
    --threads <N>              Intra-op threads, 0 lets ONNX Runtime decide [default: 0]
    --upload-url <URL>         POST each image and its detections as JSON
    --json                     Print detections as JSON lines
    --verbose                  Show verbose output

Examples:
    yolo-detect predict --model best.onnx --source image.jpg
    yolo-detect predict -m best.onnx -s frames/ --conf 0.5
    yolo-detect predict -m yolo11n.onnx -s image.jpg --imgsz 640 --num-classes 80 --box-format xywh
    yolo-detect predict -m best.onnx -s image.jpg --upload-url https://example.com/api/detections"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run detection on an image or a directory of images
    Predict(PredictArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Path to ONNX model file
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Image file or directory of images
    #[arg(short, long)]
    pub source: String,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Square model input size
    #[arg(long, default_value_t = DEFAULT_TARGET_SIZE)]
    pub imgsz: u32,

    /// Number of classes predicted by the model
    #[arg(long, default_value_t = DEFAULT_NUM_CLASSES)]
    pub num_classes: usize,

    /// Box encoding of the raw output (xyxy or xywh)
    #[arg(long, default_value_t = BoxFormat::Xyxy)]
    pub box_format: BoxFormat,

    /// Maximum detections per image
    #[arg(long, default_value_t = 300)]
    pub max_det: usize,

    /// Intra-op threads (0 lets ONNX Runtime decide)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// POST each image and its detections as JSON to this URL
    #[arg(long)]
    pub upload_url: Option<String>,

    /// Print detections as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_args_defaults() {
        let args = Cli::parse_from(["app", "predict", "--source", "image.jpg"]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, DEFAULT_MODEL);
                assert_eq!(predict_args.source, "image.jpg");
                assert!((predict_args.conf - 0.25).abs() < f32::EPSILON);
                assert!((predict_args.iou - 0.45).abs() < f32::EPSILON);
                assert_eq!(predict_args.imgsz, 512);
                assert_eq!(predict_args.num_classes, 5);
                assert_eq!(predict_args.box_format, BoxFormat::Xyxy);
                assert_eq!(predict_args.max_det, 300);
                assert!(predict_args.upload_url.is_none());
                assert!(!predict_args.json);
                assert!(predict_args.verbose);
            }
        }
    }

    #[test]
    fn test_predict_args_custom() {
        let args = Cli::parse_from([
            "app",
            "predict",
            "--model",
            "custom.onnx",
            "--source",
            "frames/",
            "--conf",
            "0.8",
            "--box-format",
            "xywh",
            "--num-classes",
            "80",
            "--json",
            "--verbose",
            "false",
        ]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, "custom.onnx");
                assert_eq!(predict_args.source, "frames/");
                assert!((predict_args.conf - 0.8).abs() < f32::EPSILON);
                assert_eq!(predict_args.box_format, BoxFormat::CenterSize);
                assert_eq!(predict_args.num_classes, 80);
                assert!(predict_args.json);
                assert!(!predict_args.verbose);
            }
        }
    }

    #[test]
    fn test_predict_requires_source() {
        assert!(Cli::try_parse_from(["app", "predict"]).is_err());
        let args = ["app", "predict", "-s", "a.jpg", "--box-format", "polygon"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
