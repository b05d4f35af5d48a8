// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate failure;
extern crate num_cpus;
extern crate rand;
extern crate tracing;
extern crate tracing_subscriber;
extern crate wallbrot;

use clap::{App, Arg, ArgMatches};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wallbrot::palette::{builtin_palettes, CycleMode};
use wallbrot::regions::known_regions;
use wallbrot::render::{BrightnessWave, RenderStrategy};
use wallbrot::{Generator, GeneratorConfig, PowerSpec, Variant, Wallpaper};

fn validate_parse<T: FromStr>(s: &str, err: &str) -> Result<(), String> {
    match T::from_str(s) {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("{}: {:?}", err, s)),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_blend(s: &str) -> Result<(), String> {
    match f64::from_str(s) {
        Ok(blend) if blend >= 0.0 && blend <= 1.0 => Ok(()),
        Ok(_) => Err("Anti-grain blend must be between 0 and 1".to_string()),
        Err(_) => Err(format!("Could not parse anti-grain blend: {:?}", s)),
    }
}

const OUTPUT: &str = "output";
const COUNT: &str = "count";
const POWER: &str = "power";
const VARIANT: &str = "variant";
const PALETTE: &str = "palette";
const REGION: &str = "region";
const ORGANIC: &str = "organic";
const SEED: &str = "seed";
const THREADS: &str = "threads";
const ATTEMPTS: &str = "attempts";
const CYCLE: &str = "cycle";
const STRATEGY: &str = "strategy";
const ANTI_GRAIN: &str = "anti-grain";
const COLOR_WAVE: &str = "color-wave";
const PREVIEW: &str = "preview";
const LIST_PALETTES: &str = "list-palettes";
const LIST_REGIONS: &str = "list-regions";
const VERBOSE: &str = "verbose";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("wallbrot")
        .version("0.1.0")
        .about("Finds interesting corners of escape-time fractals and renders them as wallpapers")
        .arg(
            Arg::with_name(OUTPUT)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .default_value(".")
                .help("Directory to write images into"),
        )
        .arg(
            Arg::with_name(COUNT)
                .long(COUNT)
                .short("n")
                .takes_value(true)
                .default_value("1")
                .validator(|s| validate_range(&s, 1, 1000, "Could not parse count", "Count must be between 1 and 1000"))
                .help("Number of wallpaper sets to generate"),
        )
        .arg(
            Arg::with_name(POWER)
                .long(POWER)
                .short("p")
                .takes_value(true)
                .validator(|s| validate_parse::<PowerSpec>(&s, "Could not parse power"))
                .help("Exponent, e.g. 3 or 2.5+0.7i"),
        )
        .arg(
            Arg::with_name(VARIANT)
                .long(VARIANT)
                .takes_value(true)
                .validator(|s| validate_parse::<Variant>(&s, "Unknown variant"))
                .help("standard, conjugate (tricorn) or burning-ship"),
        )
        .arg(
            Arg::with_name(PALETTE)
                .long(PALETTE)
                .takes_value(true)
                .help("Palette name (see --list-palettes)"),
        )
        .arg(
            Arg::with_name(REGION)
                .long(REGION)
                .takes_value(true)
                .help("Seed region name (see --list-regions)"),
        )
        .arg(
            Arg::with_name(ORGANIC)
                .long(ORGANIC)
                .help("Discover regions even for fractals with seed regions"),
        )
        .arg(
            Arg::with_name(SEED)
                .long(SEED)
                .takes_value(true)
                .validator(|s| validate_parse::<u64>(&s, "Could not parse seed"))
                .help("Random seed, for repeatable runs"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of render threads [default: all cores]"),
        )
        .arg(
            Arg::with_name(ATTEMPTS)
                .long(ATTEMPTS)
                .takes_value(true)
                .default_value("30")
                .validator(|s| validate_range(&s, 1, 1000, "Could not parse attempts", "Attempts must be between 1 and 1000"))
                .help("Candidates to try per wallpaper before giving up"),
        )
        .arg(
            Arg::with_name(CYCLE)
                .long(CYCLE)
                .takes_value(true)
                .default_value("modulo")
                .validator(|s| validate_parse::<CycleMode>(&s, "Unknown cycle mode"))
                .help("Palette cycling: clamp, reflect or modulo"),
        )
        .arg(
            Arg::with_name(STRATEGY)
                .long(STRATEGY)
                .takes_value(true)
                .possible_values(&["auto", "direct", "adaptive"])
                .default_value("auto")
                .help("Render every pixel, or skip solid interior tiles"),
        )
        .arg(
            Arg::with_name(ANTI_GRAIN)
                .long(ANTI_GRAIN)
                .takes_value(true)
                .validator(|s| validate_blend(&s))
                .help("Blend each pixel with its four neighbours, e.g. 0.45"),
        )
        .arg(
            Arg::with_name(COLOR_WAVE)
                .long(COLOR_WAVE)
                .help("Ripple brightness along the escape gradient"),
        )
        .arg(
            Arg::with_name(PREVIEW)
                .long(PREVIEW)
                .help("Quarter-size renders and a coarse discovery scan"),
        )
        .arg(
            Arg::with_name(LIST_PALETTES)
                .long(LIST_PALETTES)
                .help("Print the palette names and exit"),
        )
        .arg(
            Arg::with_name(LIST_REGIONS)
                .long(LIST_REGIONS)
                .help("Print the seed regions for --power and exit"),
        )
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .multiple(true)
                .help("More logging; RUST_LOG overrides"),
        )
        .get_matches()
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn power_spec(matches: &ArgMatches) -> Result<PowerSpec, failure::Error> {
    let mut spec = match matches.value_of(POWER) {
        Some(power) => PowerSpec::from_str(power)?,
        None => PowerSpec::classic(),
    };
    if let Some(variant) = matches.value_of(VARIANT) {
        spec.variant = Variant::from_str(variant)?;
    }
    Ok(spec)
}

fn config(matches: &ArgMatches) -> Result<GeneratorConfig, failure::Error> {
    let mut config = if matches.is_present(PREVIEW) {
        GeneratorConfig::preview()
    } else {
        GeneratorConfig::default()
    };

    if let Some(power) = matches.value_of(POWER) {
        config.overrides.power = Some(PowerSpec::from_str(power)?.power);
    }
    if let Some(variant) = matches.value_of(VARIANT) {
        config.overrides.variant = Some(Variant::from_str(variant)?);
    }
    config.overrides.palette = matches.value_of(PALETTE).map(String::from);
    config.overrides.region = matches.value_of(REGION).map(String::from);
    if matches.is_present(ORGANIC) {
        config.overrides.organic = Some(true);
    }
    if let Some(threads) = matches.value_of(THREADS) {
        config.render.threads = usize::from_str(threads)?;
    }
    if let Some(attempts) = matches.value_of(ATTEMPTS) {
        config.max_attempts = usize::from_str(attempts)?;
    }
    if let Some(cycle) = matches.value_of(CYCLE) {
        config.render.cycle_mode = CycleMode::from_str(cycle)?;
    }
    if let Some(blend) = matches.value_of(ANTI_GRAIN) {
        config.render.anti_grain = Some(f64::from_str(blend)?);
    }
    if matches.is_present(COLOR_WAVE) {
        config.render.color_wave = Some(BrightnessWave::default());
    }
    config.render.strategy = match matches.value_of(STRATEGY) {
        Some("direct") => RenderStrategy::Direct,
        Some("adaptive") => RenderStrategy::Adaptive,
        _ => RenderStrategy::Auto,
    };
    Ok(config)
}

fn save(dir: &Path, index: usize, wallpaper: &Wallpaper) -> Result<(), failure::Error> {
    let stem = format!("wallbrot_{}", index);
    let scan = dir.join(format!("{}_scan.png", stem));
    wallpaper.scan.save(&scan)?;
    info!(path = %scan.display(), "saved scan");

    for crop in &wallpaper.crops {
        let path: PathBuf = dir.join(format!("{}_{}.png", stem, crop.target.name));
        crop.image.save(&path)?;
        info!(path = %path.display(), "saved");
    }

    fs::write(dir.join(format!("{}.txt", stem)), wallpaper.metadata.to_string())?;
    Ok(())
}

fn run() -> Result<(), failure::Error> {
    let matches = args();
    init_logging(matches.occurrences_of(VERBOSE));

    if matches.is_present(LIST_PALETTES) {
        for palette in builtin_palettes() {
            println!("{}", palette.name);
        }
        return Ok(());
    }

    if matches.is_present(LIST_REGIONS) {
        let spec = power_spec(&matches)?;
        match known_regions(&spec) {
            Some(regions) => {
                for region in regions {
                    println!("{}\t{}\t{:+}i", region.name, region.center.re, region.center.im);
                }
            }
            None => println!("{} has no seed regions; they are discovered per run", spec.name()),
        }
        return Ok(());
    }

    let config = config(&matches)?;
    let dir = PathBuf::from(matches.value_of(OUTPUT).unwrap_or("."));
    fs::create_dir_all(&dir)?;

    let mut rng = match matches.value_of(SEED) {
        Some(seed) => StdRng::seed_from_u64(u64::from_str(seed)?),
        None => StdRng::from_entropy(),
    };

    let count = usize::from_str(matches.value_of(COUNT).unwrap_or("1"))?;
    let mut generator = Generator::new(config);
    for index in 1..=count {
        info!(index, of = count, "generating");
        let wallpaper = generator.generate(&mut rng)?;
        save(&dir, index, &wallpaper)?;
        print!("{}", wallpaper.metadata);
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("wallbrot: {}", e);
        std::process::exit(1);
    }
}
