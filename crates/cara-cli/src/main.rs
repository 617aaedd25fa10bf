use anyhow::{anyhow, bail, Context, Result};
use cara_lib::{
    ari::compute_ari,
    io::{csv as csv_io, text as text_io},
    pipeline::{analyze_case, analyze_sides, spectra, AnalysisConfig, CaseSummary, Units},
    plot::{figure_from_fit, figure_from_transfer, Figure, Series, TransferPlot},
    signal::TimeSeries,
    spectral::{Detrend, WindowType},
    tfa::{transfer_function, BandSummary, Estimator, SignificanceLevel, TransferFunctionEstimate},
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "cara",
    version,
    about = "Cerebral autoregulation analysis: spectra, transfer function and ARI"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the recording comes from and how it is sampled.
#[derive(Args, Debug)]
struct InputArgs {
    /// CSV recording with a header row
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "ABP")]
    pressure_col: String,
    /// Time column (seconds) used to derive the sampling rate
    #[arg(long)]
    time_col: Option<String>,
    /// Sampling rate in Hz when there is no time column
    #[arg(long)]
    fs: Option<f64>,
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Single-column pressure file, instead of --input
    #[arg(long)]
    pressure: Option<PathBuf>,
    #[arg(long)]
    pressure_unit: Option<String>,
    #[arg(long)]
    flow_unit: Option<String>,
}

/// Analysis parameters; flags override the configuration file.
#[derive(Args, Debug)]
struct AnalysisArgs {
    /// TOML analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// rectangular, hann, hamming or tukey
    #[arg(long)]
    window: Option<String>,
    /// none, constant or linear
    #[arg(long)]
    detrend: Option<String>,
    #[arg(long)]
    overlap: Option<f64>,
    /// Segment length in seconds
    #[arg(long)]
    segment_s: Option<f64>,
    /// h1 or h2
    #[arg(long)]
    estimator: Option<String>,
    /// 1%, 5% or 10%
    #[arg(long)]
    significance: Option<String>,
    /// Skip frequency-axis smoothing of the spectra
    #[arg(long)]
    no_smoothing: bool,
}

#[derive(Args, Debug)]
struct CaseArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Flow column of the CSV recording
    #[arg(long, default_value = "CBFV")]
    flow_col: String,
    /// Single-column flow file, instead of --input
    #[arg(long)]
    flow: Option<PathBuf>,
    #[command(flatten)]
    analysis: AnalysisArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Welch auto- and cross-spectra of pressure and flow
    Psd(CaseArgs),
    /// Transfer function, coherence and band statistics
    Tfa(CaseArgs),
    /// Step response and autoregulation index
    Ari(CaseArgs),
    /// Left and right flow channels against one pressure channel
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value = "CBFV_L")]
        left_col: String,
        #[arg(long, default_value = "CBFV_R")]
        right_col: String,
        /// Single-column left flow file, instead of --input
        #[arg(long)]
        left: Option<PathBuf>,
        /// Single-column right flow file, instead of --input
        #[arg(long)]
        right: Option<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Render the step response and its best-fit model to a PNG via plotters
    AriPlot {
        #[command(flatten)]
        case: CaseArgs,
        #[arg(long)]
        out: PathBuf,
    },
    /// Gain, phase and coherence against frequency with band means; PNG via
    /// plotters, or the figure model as JSON without --out
    TfaPlot {
        #[command(flatten)]
        case: CaseArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Upper frequency limit in Hz
        #[arg(long, default_value_t = 0.5)]
        max_freq: f64,
        #[arg(long, default_value_t = 2000)]
        max_points: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Psd(case) => cmd_psd(&case)?,
        Commands::Tfa(case) => cmd_tfa(&case)?,
        Commands::Ari(case) => cmd_ari(&case)?,
        Commands::Analyze {
            input,
            left_col,
            right_col,
            left,
            right,
            analysis,
        } => cmd_analyze(
            &input,
            &left_col,
            &right_col,
            left.as_deref(),
            right.as_deref(),
            &analysis,
        )?,
        Commands::AriPlot { case, out } => cmd_ari_plot(&case, &out)?,
        Commands::TfaPlot {
            case,
            out,
            max_freq,
            max_points,
        } => cmd_tfa_plot(&case, out.as_deref(), max_freq, max_points)?,
    }
    Ok(())
}

fn analysis_config(args: &AnalysisArgs) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(window) = &args.window {
        cfg.welch.window = window.parse::<WindowType>()?;
    }
    if let Some(detrend) = &args.detrend {
        cfg.welch.detrend = detrend.parse::<Detrend>()?;
    }
    if let Some(overlap) = args.overlap {
        cfg.welch.overlap = overlap;
    }
    if let Some(segment) = args.segment_s {
        cfg.welch.segment_length_s = segment;
    }
    if let Some(estimator) = &args.estimator {
        cfg.estimator = estimator.parse::<Estimator>()?;
    }
    if let Some(level) = &args.significance {
        cfg.significance = level.parse::<SignificanceLevel>()?;
    }
    if args.no_smoothing {
        cfg.smooth_spectra = false;
    }
    Ok(cfg)
}

fn delimiter(input: &InputArgs) -> Result<u8> {
    u8::try_from(input.delimiter).map_err(|_| anyhow!("delimiter must be a single ASCII character"))
}

/// Pressure plus the named flow channels, all at the same rate.
fn load_channels(
    input: &InputArgs,
    flow_cols: &[&str],
    flow_files: &[Option<&Path>],
) -> Result<(TimeSeries, Vec<TimeSeries>)> {
    if let Some(path) = &input.input {
        let mut columns = vec![input.pressure_col.as_str()];
        columns.extend_from_slice(flow_cols);
        let recording = csv_io::read_recording_csv(
            path,
            &columns,
            input.time_col.as_deref(),
            input.fs,
            delimiter(input)?,
        )?;
        info!(
            "loaded {} at {} Hz ({} channels)",
            path.display(),
            recording.fs,
            recording.channels.len()
        );
        let pressure = recording.series(&input.pressure_col)?;
        let flows = flow_cols
            .iter()
            .map(|c| recording.series(c))
            .collect::<Result<Vec<_>>>()?;
        return Ok((pressure, flows));
    }
    let pressure_path = input
        .pressure
        .as_deref()
        .context("either --input or --pressure is required")?;
    let fs = input
        .fs
        .context("--fs is required with single-column inputs")?;
    let pressure = text_io::read_series(pressure_path, fs)?;
    let flows = flow_files
        .iter()
        .map(|path| {
            let path = (*path).context("missing single-column flow file")?;
            text_io::read_series(path, fs)
        })
        .collect::<Result<Vec<_>>>()?;
    info!(
        "loaded {} pressure samples at {} Hz from {}",
        pressure.len(),
        fs,
        pressure_path.display()
    );
    Ok((pressure, flows))
}

fn units(input: &InputArgs) -> Units {
    Units {
        pressure: input.pressure_unit.clone(),
        flow: input.flow_unit.clone(),
    }
}

fn load_case(case: &CaseArgs) -> Result<(TimeSeries, TimeSeries, AnalysisConfig)> {
    let (pressure, mut flows) = load_channels(
        &case.input,
        &[case.flow_col.as_str()],
        &[case.flow.as_deref()],
    )?;
    let flow = flows.pop().context("no flow channel loaded")?;
    Ok((pressure, flow, analysis_config(&case.analysis)?))
}

fn transfer(case: &CaseArgs) -> Result<(TransferFunctionEstimate, AnalysisConfig)> {
    let (pressure, flow, cfg) = load_case(case)?;
    let spectrum = spectra(&pressure, &flow, &units(&case.input), &cfg)?;
    Ok((
        transfer_function(&spectrum, cfg.estimator, cfg.significance),
        cfg,
    ))
}

fn cmd_psd(case: &CaseArgs) -> Result<()> {
    let (pressure, flow, cfg) = load_case(case)?;
    let spectrum = spectra(&pressure, &flow, &units(&case.input), &cfg)?;
    println!("{}", serde_json::to_string(&spectrum)?);
    Ok(())
}

#[derive(Serialize)]
struct TfaOutput<'a> {
    transfer: &'a TransferFunctionEstimate,
    bands: Vec<BandSummary>,
}

fn cmd_tfa(case: &CaseArgs) -> Result<()> {
    let (tf, _) = transfer(case)?;
    let output = TfaOutput {
        bands: tf.band_summary(),
        transfer: &tf,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_ari(case: &CaseArgs) -> Result<()> {
    let (tf, cfg) = transfer(case)?;
    let fit = compute_ari(&tf, &cfg.ari)?;
    println!("{}", serde_json::to_string(&fit)?);
    Ok(())
}

#[derive(Serialize)]
struct SidesOutput {
    left: CaseSummary,
    right: CaseSummary,
}

fn cmd_analyze(
    input: &InputArgs,
    left_col: &str,
    right_col: &str,
    left: Option<&Path>,
    right: Option<&Path>,
    analysis: &AnalysisArgs,
) -> Result<()> {
    let (pressure, flows) = load_channels(input, &[left_col, right_col], &[left, right])?;
    let [left, right] = <[TimeSeries; 2]>::try_from(flows)
        .map_err(|_| anyhow!("expected left and right flow channels"))?;
    let cfg = analysis_config(analysis)?;
    let (left, right) = analyze_sides(&pressure, &left, &right, &units(input), &cfg)?;
    let output = SidesOutput {
        left: left.summary(),
        right: right.summary(),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_ari_plot(case: &CaseArgs, out: &Path) -> Result<()> {
    let (pressure, flow, cfg) = load_case(case)?;
    let report = analyze_case(&pressure, &flow, None, &units(&case.input), &cfg)?;
    let fig = figure_from_fit(&report.ari);
    draw_plotters_figures(out, &[fig], 480)?;
    info!("wrote {}", out.display());
    Ok(())
}

fn cmd_tfa_plot(case: &CaseArgs, out: Option<&Path>, max_freq: f64, max_points: usize) -> Result<()> {
    let (tf, _) = transfer(case)?;
    let figs: Vec<Figure> = [TransferPlot::Gain, TransferPlot::Phase, TransferPlot::Coherence]
        .into_iter()
        .map(|q| figure_from_transfer(&tf, q, max_freq, max_points))
        .collect();
    match out {
        Some(path) => {
            draw_plotters_figures(path, &figs, 320)?;
            info!("wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string(&figs)?),
    }
    Ok(())
}

/// Figures stacked vertically in one PNG, `panel_height` pixels each.
fn draw_plotters_figures(path: &Path, figs: &[Figure], panel_height: u32) -> Result<()> {
    let backend = BitMapBackend::new(path, (800, panel_height * figs.len().max(1) as u32));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    for (area, fig) in root.split_evenly((figs.len().max(1), 1)).iter().zip(figs) {
        draw_panel(area, fig)?;
    }
    root.present()?;
    Ok(())
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, fig: &Figure) -> Result<()> {
    let title = fig.title.clone().unwrap_or_else(|| "Plot".into());
    let Some((x_min, x_max, y_min, y_max)) = fig.bounds() else {
        warn!("{title}: nothing to plot");
        return Ok(());
    };
    let pad = ((y_max - y_min) * 0.05).max(1e-9);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max.max(x_min + 1e-9), (y_min - pad)..(y_max + pad))?;
    let mut mesh = chart.configure_mesh();
    if let Some(label) = &fig.x.label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &fig.y.label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let style = RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32);
                let points = line.points.iter().map(|p| (p[0], p[1]));
                let annotation = match line.style.dash {
                    Some([size, spacing]) => chart.draw_series(DashedLineSeries::new(
                        points,
                        size.round() as u32,
                        spacing.round() as u32,
                        style,
                    ))?,
                    None => chart.draw_series(LineSeries::new(points, style))?,
                };
                annotation
                    .label(line.name.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }
        }
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}
