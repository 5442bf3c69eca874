use std::path::PathBuf;

use console::style;
use plugload_bootstrap::{BootstrapSettings, Coordinator};
use plugload_core::{DiscoveryReport, PluginSummary, Result, ShutdownReport};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct RunOutput {
    root: PathBuf,
    plugins: Vec<PluginSummary>,
    discovery: DiscoveryReport,
    shutdown: ShutdownReport,
}

/// One full load/unload cycle, as `plugload_initialize` + `plugload_shutdown` would run it.
pub(super) fn cmd_run(
    config_path: Option<PathBuf>,
    residence: PathBuf,
    root: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let settings = BootstrapSettings {
        config_path,
        residence: Some(residence),
        plugin_root: root,
        // The CLI installed its own subscriber.
        install_logging: false,
        loader: None,
    };

    let coordinator = Coordinator::start(settings)?;
    let root = coordinator.host().root().to_path_buf();
    debug!(root = %root.display(), "plugin system started; shutting down");
    let plugins = coordinator.host().registry().summaries();
    let discovery = coordinator.report().clone();
    let shutdown = coordinator.stop();

    let output = RunOutput {
        root,
        plugins,
        discovery,
        shutdown,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_run(&output);
    }
    Ok(())
}

fn print_run(output: &RunOutput) {
    println!("{} {}", style("Plugin root:").bold(), output.root.display());

    if output.plugins.is_empty() {
        println!("No plugins loaded.");
    } else {
        println!("{}", style(format!("Plugins ({}):", output.plugins.len())).bold());
        for p in &output.plugins {
            println!("  {} v{} ({} in {})", p.name, p.version, p.type_name, p.scope);
        }
    }

    let d = &output.discovery;
    println!(
        "\n  {} directories, {} modules loaded, {} failed, {} activations failed",
        d.directories, d.modules_loaded, d.modules_failed, d.activations_failed
    );
    for w in &d.warnings {
        println!("  {} {w}", style("warning:").yellow());
    }
    for e in &d.errors {
        println!("  {} {e}", style("error:").red());
    }

    let s = &output.shutdown;
    println!(
        "  {} shut down, {} failed, {} scopes released",
        s.shut_down,
        s.failed.len(),
        s.scopes_released
    );
    for f in &s.failed {
        println!("  {} {f}", style("shutdown failed:").red());
    }
}
