use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use doseval::accessor::{DoseAccessor, DoseAccessorRef, GridDoseAccessor, MaskAccessorRef, MaskVoxel, VoxelMaskAccessor};
use doseval::config::read_config_file;
use doseval::gamma::GammaIndex;
use doseval::io;
use doseval::iterator::MaskedDoseIterator;
use doseval::mappable::SimpleMappableAccessor;
use doseval::statistics::DoseStatistics;
use geometry::Identity;

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "dosegamma", about = "Gamma index of a measured dose against a reference dose")]
pub struct Cli {
    /// TOML file with gamma criteria and grid layouts
    #[clap(short, long)]
    pub config: PathBuf,

    /// Raw f32 measured dose, laid out on the `[measured]` grid
    #[clap(short, long)]
    pub measured: PathBuf,

    /// Raw f32 reference dose, laid out on the `[reference]` grid
    #[clap(short, long)]
    pub reference: PathBuf,

    /// Where to write the gamma values (raw f32, measured grid)
    #[clap(short, long)]
    pub out: PathBuf,

    /// Maximum number of rayon threads
    #[clap(short = 'j', long, default_value = "4")]
    pub num_threads: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Cli::parse();

    rayon::ThreadPoolBuilder::new().num_threads(args.num_threads).build_global()?;

    if let Some(dir) = args.out.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let config = read_config_file(&args.config)?;
    let measured_info  = config.measured.geometric_info()?;
    let reference_info = config.reference.as_ref().unwrap_or(&config.measured).geometric_info()?;

    let measured  = io::import_grid(measured_info , &args.measured )?;
    let reference = io::import_grid(reference_info, &args.reference)?;
    let max_reference_dose = reference.data().iter().copied().fold(0.0, f64::max);
    info!("reference dose maximum: {max_reference_dose:.4} Gy");

    let measured: DoseAccessorRef = Arc::new(measured);
    let reference: DoseAccessorRef = if reference_info == measured_info {
        Arc::new(reference)
    } else {
        info!("resampling reference onto measured grid");
        Arc::new(SimpleMappableAccessor::with_kind(
            measured_info, Arc::new(reference) as DoseAccessorRef, Arc::new(Identity) as Arc<dyn geometry::Transformation>,
            config.interpolation, config.padding,
        )?)
    };

    let parameters = config.parameters(max_reference_dose);
    let gamma = GammaIndex::new(measured, reference, None, parameters)?
        .with_interpolation(config.interpolation);

    // --- Progress bar --------------------------------------------------------------
    let progress = ProgressBar::new(gamma.grid_size() as u64);
    progress.set_style(ProgressStyle::default_bar()
                       .template("Gamma: [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")?);
    let values = io::pull(&gamma, || progress.inc(1))?;
    progress.finish();

    // --- Summary -------------------------------------------------------------------
    let evaluated: Vec<_> = values.iter().enumerate()
        .filter(|(_, g)| !g.is_nan())
        .map(|(id, _)| MaskVoxel::new(id, 1.0))
        .collect();
    if evaluated.is_empty() {
        println!("No voxel could be evaluated");
    } else {
        let n_evaluated = evaluated.len();
        let info = *gamma.geometric_info();
        let gamma_grid: DoseAccessorRef = Arc::new(GridDoseAccessor::new(info, values.clone())?);
        let evaluated: MaskAccessorRef = Arc::new(VoxelMaskAccessor::new(info, evaluated)?);
        let mut stats = DoseStatistics::new(MaskedDoseIterator::new(gamma_grid, evaluated)?);
        stats.init()?;
        let failing = stats.vx(1.0)? / info.voxel_volume();
        println!("{:.0} / {n_evaluated} voxels pass ({:.2}%), mean gamma {:.3}, max {:.3}",
                 n_evaluated as f64 - failing,
                 100.0 * (1.0 - failing / n_evaluated as f64),
                 stats.mean()?, stats.maximum()?);
    }

    println!("Writing gamma values to {}", args.out.display());
    io::raw::write(values.iter().map(|&g| g as f32), &args.out)?;
    Ok(())
}
