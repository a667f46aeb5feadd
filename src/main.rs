// yolo-detect 🚀 AGPL-3.0 License

use clap::Parser;

use yolo_detect::cli::args::{Cli, Commands};
use yolo_detect::cli::logging::{init_tracing, set_verbose};
use yolo_detect::cli::predict::run_prediction;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Predict(args) => {
            set_verbose(args.verbose);
            init_tracing(args.verbose);
            run_prediction(&args);
        }
    }
}
