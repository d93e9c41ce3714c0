use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hn_app::{
    AppError, AppResult, EditSession, RunOptions, RunProgressEvent, RunStage, project_service,
    query, run_service,
};
use hn_results::SimulationRequest;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hn-cli")]
#[command(about = "Hydronet CLI - water distribution network editing and simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a network file (INP, project YAML or JSON) for topology errors
    Validate {
        /// Path to the network file
        path: PathBuf,
    },
    /// Convert an INP file into a project file
    Import {
        /// Path to the INP file
        inp_path: PathBuf,
        /// Output project file (.yaml or .json)
        output: PathBuf,
        /// Project name (defaults to the INP file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Write a network as INP text
    ExportInp {
        /// Path to the network file
        path: PathBuf,
        /// Output file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a network as a GeoJSON feature collection
    ExportGeojson {
        /// Path to the network file
        path: PathBuf,
        /// Output file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a hydraulic simulation
    Simulate {
        /// Path to the network file
        path: PathBuf,
        /// Wall-clock limit in seconds
        #[arg(long, default_value_t = 60.0)]
        timeout: f64,
        /// Directory for cached runs
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
        /// Print the full result as endpoint JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer one endpoint request: `{"inp": ...}` on stdin, reply JSON on stdout
    Serve {
        /// Wall-clock limit in seconds
        #[arg(long, default_value_t = 60.0)]
        timeout: f64,
    },
    /// List cached runs for a network
    Runs {
        /// Run cache directory
        cache_dir: PathBuf,
        /// Network id the runs were stored under
        network_id: String,
    },
    /// Show details of a cached run
    ShowRun {
        /// Run cache directory
        cache_dir: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export time series data from a cached run
    ExportSeries {
        /// Run cache directory
        cache_dir: PathBuf,
        /// Run ID
        run_id: String,
        /// Node or link ID
        entity_id: String,
        /// Variable name (head, pressure, demand, flow, velocity, headloss, status)
        variable: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Import {
            inp_path,
            output,
            name,
        } => cmd_import(&inp_path, &output, name.as_deref()),
        Commands::ExportInp { path, output } => cmd_export_inp(&path, output.as_deref()),
        Commands::ExportGeojson { path, output } => cmd_export_geojson(&path, output.as_deref()),
        Commands::Simulate {
            path,
            timeout,
            cache_dir,
            no_cache,
            json,
        } => cmd_simulate(&path, timeout, cache_dir, !no_cache, json),
        Commands::Serve { timeout } => cmd_serve(timeout),
        Commands::Runs {
            cache_dir,
            network_id,
        } => cmd_runs(&cache_dir, &network_id),
        Commands::ShowRun { cache_dir, run_id } => cmd_show_run(&cache_dir, &run_id),
        Commands::ExportSeries {
            cache_dir,
            run_id,
            entity_id,
            variable,
            output,
        } => cmd_export_series(
            &cache_dir,
            &run_id,
            &entity_id,
            &variable,
            output.as_deref(),
        ),
    }
}

/// Open any supported network file as an editing session.
fn load_session(path: &Path) -> AppResult<EditSession> {
    tracing::debug!(path = %path.display(), "loading network");
    match path.extension().and_then(|e| e.to_str()) {
        Some("inp") => project_service::import_inp_file(path),
        _ => {
            let project = project_service::load_project_file(path)?;
            EditSession::from_document(&project.document)
        }
    }
}

fn network_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("network")
        .to_string()
}

fn timeout_from_secs(secs: f64) -> AppResult<Option<Duration>> {
    if secs <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| AppError::InvalidInput(format!("Invalid timeout {secs}: {e}")))
}

fn write_output(text: &str, output: Option<&Path>) -> AppResult<()> {
    match output {
        Some(path) => std::fs::write(path, text).map_err(|e| AppError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        }),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn cmd_validate(path: &Path) -> AppResult<()> {
    println!("Validating network: {}", path.display());
    let session = load_session(path)?;
    let store = session.store().read();
    hn_network::check_invariants(&store)?;
    println!("✓ Network is valid");
    println!("  Nodes: {}", store.node_count());
    println!("  Links: {}", store.link_count());
    drop(store);

    let isolated = session.topology().isolated_nodes();
    if !isolated.is_empty() {
        println!("  Isolated nodes: {}", isolated.len());
        for id in isolated {
            println!("    {id}");
        }
    }
    Ok(())
}

fn cmd_import(inp_path: &Path, output: &Path, name: Option<&str>) -> AppResult<()> {
    let session = project_service::import_inp_file(inp_path)?;
    let name = name.map_or_else(|| network_id(inp_path), str::to_string);
    let project = project_service::session_to_project(&name, &session)?;
    project_service::save_project_file(output, &project)?;
    println!("✓ Imported {} into {}", inp_path.display(), output.display());
    Ok(())
}

fn cmd_export_inp(path: &Path, output: Option<&Path>) -> AppResult<()> {
    let session = load_session(path)?;
    write_output(&session.export_inp()?, output)
}

fn cmd_export_geojson(path: &Path, output: Option<&Path>) -> AppResult<()> {
    let session = load_session(path)?;
    let collection = hn_project::to_feature_collection(&session.store().read())?;
    let text = serde_json::to_string_pretty(&collection)
        .map_err(|e| AppError::Project(format!("Failed to serialize features: {e}")))?;
    write_output(&text, output)
}

fn cmd_simulate(
    path: &Path,
    timeout: f64,
    cache_dir: Option<PathBuf>,
    use_cache: bool,
    json: bool,
) -> AppResult<()> {
    let session = load_session(path)?;
    let inp = session.export_inp()?;
    let options = RunOptions {
        timeout: timeout_from_secs(timeout)?,
        use_cache,
        store_root: cache_dir,
        network_id: network_id(path),
        ..RunOptions::default()
    };

    if json {
        let reply = run_service::simulate(&SimulationRequest::new(inp), &options);
        let text = serde_json::to_string(&reply)
            .map_err(|e| AppError::Results(format!("Failed to serialize reply: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("Simulating network: {}", path.display());
    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let outcome = run_service::run_inp_with_progress(
        &inp,
        &options,
        Some(&mut |event| {
            let emit_now =
                last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if outcome.loaded_from_cache {
        println!("✓ Loaded from cache: {}", outcome.run_id);
    } else {
        println!("✓ Simulation completed: {}", outcome.run_id);
    }
    let summary = query::get_run_summary(&outcome.history)?;
    println!("  Snapshots: {}", summary.snapshot_count);
    println!(
        "  Time range: {} - {} s",
        summary.time_range.0, summary.time_range.1
    );
    println!("  Nodes: {}", summary.node_count);
    println!("  Links: {}", summary.link_count);
    println!("  Wall time: {:.3}s", outcome.elapsed_s);
    Ok(())
}

fn cmd_serve(timeout: f64) -> AppResult<()> {
    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;
    // A body that is not a request object is treated as one without INP data
    let request: SimulationRequest =
        serde_json::from_str(&body).unwrap_or(SimulationRequest { inp: None });
    let options = RunOptions {
        timeout: timeout_from_secs(timeout)?,
        use_cache: false,
        ..RunOptions::default()
    };
    let reply = run_service::simulate(&request, &options);
    let text = serde_json::to_string(&reply)
        .map_err(|e| AppError::Results(format!("Failed to serialize reply: {e}")))?;
    println!("{text}");
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    let label = match event.stage {
        RunStage::CheckingCache => "checking cache",
        RunStage::LoadingCachedResult => "loading cached result",
        RunStage::Simulating => "simulating",
        RunStage::SavingResults => "saving results",
        RunStage::Completed => "completed",
    };
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx], label, event.elapsed_wall_s
    );
    if let Some(step) = &event.step {
        line.push_str(&format!("  step={}  t={}s", step.step, step.time));
    }
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {msg}"));
    }
    print!("{line}");
    let _ = io::stdout().flush();
}

fn cmd_runs(cache_dir: &Path, network_id: &str) -> AppResult<()> {
    let runs = run_service::list_runs(cache_dir, network_id)?;

    if runs.is_empty() {
        println!("No cached runs found for network: {network_id}");
    } else {
        println!("Cached runs for network '{network_id}':");
        for manifest in runs {
            println!(
                "  {} ({}, {} snapshots)",
                manifest.run_id, manifest.timestamp, manifest.steps
            );
        }
    }
    Ok(())
}

fn cmd_show_run(cache_dir: &Path, run_id: &str) -> AppResult<()> {
    println!("Loading run: {run_id}");

    let (manifest, history) = run_service::load_run(cache_dir, run_id)?;
    let summary = query::get_run_summary(&history)?;

    println!("\nRun Summary:");
    println!("  Engine: {}", manifest.engine_version);
    println!("  Snapshots: {}", summary.snapshot_count);
    println!(
        "  Time range: {} - {} s",
        summary.time_range.0, summary.time_range.1
    );

    println!("\nNodes:");
    for id in query::list_node_ids(&history) {
        println!("  {id}");
    }
    println!("\nLinks:");
    for id in query::list_link_ids(&history) {
        println!("  {id}");
    }
    Ok(())
}

fn cmd_export_series(
    cache_dir: &Path,
    run_id: &str,
    entity_id: &str,
    variable: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let (_manifest, history) = run_service::load_run(cache_dir, run_id)?;

    // Try node variable first
    let series = match query::extract_node_series(&history, entity_id, variable) {
        Ok(data) => data,
        Err(_) => query::extract_link_series(&history, entity_id, variable)?,
    };

    let mut csv = String::from("time_s,value\n");
    for (t, val) in &series {
        csv.push_str(&format!("{t},{val}\n"));
    }

    if let Some(path) = output {
        write_output(&csv, Some(path))?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        print!("{csv}");
    }
    Ok(())
}
