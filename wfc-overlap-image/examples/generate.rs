use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process;
use wfc_overlap::overlapping::Options;
use wfc_overlap::{Heuristic, Size};
use wfc_overlap_image::retry::NumTimes;
use wfc_overlap_image::{generate_image_with_rng, options_for_image};

/// Synthesize a texture from an exemplar image.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[arg(short, long)]
    input_path: PathBuf,

    #[arg(short, long)]
    output_path: PathBuf,

    #[arg(short = 'x', long, default_value_t = 48)]
    width: u32,

    #[arg(short = 'y', long, default_value_t = 48)]
    height: u32,

    #[arg(short, long, default_value_t = 3)]
    pattern_size: u32,

    /// Number of dihedral variants applied during extraction, 1 to 8.
    #[arg(long, default_value_t = 1)]
    symmetry: u32,

    #[arg(long)]
    periodic_input: bool,

    #[arg(long)]
    periodic_output: bool,

    /// Pin the bottom output row to the last extracted pattern.
    #[arg(long)]
    ground: bool,

    /// entropy, mrv or scanline
    #[arg(long, default_value = "entropy")]
    heuristic: String,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long, default_value_t = 10)]
    retries: usize,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let heuristic = match args.heuristic.as_str() {
        "entropy" => Heuristic::Entropy,
        "mrv" => Heuristic::Mrv,
        "scanline" => Heuristic::Scanline,
        other => {
            eprintln!("unknown heuristic: {}", other);
            process::exit(2);
        }
    };
    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    println!("seed: {}", seed);
    let image = image::open(&args.input_path).expect("failed to open the input image");
    let options = options_for_image(
        &image,
        Options {
            input_size: Size::new(0, 0),
            output_size: Size::new(args.width, args.height),
            pattern_size: NonZeroU32::new(args.pattern_size)
                .expect("pattern size may not be zero"),
            periodic_input: args.periodic_input,
            periodic_output: args.periodic_output,
            symmetry: args.symmetry,
            heuristic,
            ground: args.ground,
        },
    );
    let mut rng = XorShiftRng::seed_from_u64(seed);
    match generate_image_with_rng(&image, options, NumTimes(args.retries), &mut rng) {
        Ok(Ok(output)) => output
            .save(&args.output_path)
            .expect("failed to save the output image"),
        Ok(Err(error)) => {
            eprintln!("generation failed: {}", error);
            process::exit(1);
        }
        Err(error) => {
            eprintln!("invalid configuration: {}", error);
            process::exit(2);
        }
    }
}
