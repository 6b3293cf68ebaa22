use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use graphview_core::Point;
use graphview_graph::{Graph, LayeredLayout, LayoutOptions, MonospaceMeasurer, SvgScene, shared};
use graphview_viewer::{Viewer, ViewerSettings};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Svg,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lay out a graph document and export the drawing", long_about = None)]
struct Args {
    /// Graph document: JSON with `nodes` and `edges` lists
    graph: PathBuf,

    /// Layout options (JSON); missing fields take their defaults
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Viewer settings (JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Svg)]
    format: Format,

    /// Zoom factor applied around the top-left corner before export
    #[arg(short, long)]
    zoom: Option<f64>,
}

fn main() -> Result<()> {
    // stdout carries only the export
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let output = render(&args)?;
    println!("{}", output);
    Ok(())
}

fn load_options(path: Option<&Path>) -> Result<LayoutOptions> {
    let Some(path) = path else {
        return Ok(LayoutOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read layout options {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse layout options {}", path.display()))
}

fn render(args: &Args) -> Result<String> {
    let text = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read graph {}", args.graph.display()))?;
    let graph = Graph::from_json_str(&text)
        .with_context(|| format!("Failed to load graph {}", args.graph.display()))?;
    let options = load_options(args.options.as_deref())?;
    let settings = match &args.settings {
        Some(path) => ViewerSettings::load(path)?,
        None => ViewerSettings::default(),
    };

    tracing::info!(
        "Loaded {} nodes and {} edges from {:?}",
        graph.node_count(),
        graph.edge_count(),
        args.graph
    );

    let scene = SvgScene::new().with_arrowhead_length(settings.arrowhead_length);
    let mut viewer = Viewer::new(MonospaceMeasurer::new(), LayeredLayout::new(), scene, settings);
    viewer
        .set_graph(shared(graph), options)
        .context("Failed to lay out graph")?;

    if let Some(zoom) = args.zoom
        && !viewer.zoom_by(zoom, Point::ORIGIN)
    {
        tracing::warn!("Zoom factor {} left the scale unchanged", zoom);
    }

    Ok(match args.format {
        Format::Svg => viewer.svg_string(),
        Format::Json => viewer.json_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args_for(graph: &Path) -> Args {
        Args {
            graph: graph.to_path_buf(),
            options: None,
            settings: None,
            format: Format::Svg,
            zoom: None,
        }
    }

    const GRAPH: &str = r#"{
        "nodes": [{ "id": 1, "label": "a" }, { "id": 2, "label": "b" }],
        "edges": [{ "id": 1, "source": 1, "target": 2 }]
    }"#;

    #[test]
    fn test_render_svg() {
        let graph = write_temp(GRAPH);
        let svg = render(&args_for(graph.path())).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches(r#"class="node""#).count(), 2);
    }

    #[test]
    fn test_render_json_with_options() {
        let graph = write_temp(GRAPH);
        let options = write_temp(r#"{ "layout_type": "Grid", "node_separation": 10.0 }"#);
        let mut args = args_for(graph.path());
        args.options = Some(options.path().to_path_buf());
        args.format = Format::Json;

        let json = render(&args).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
        assert!(value["nodes"][0]["center"].is_object());
    }

    #[test]
    fn test_bad_options_report_path() {
        let graph = write_temp(GRAPH);
        let options = write_temp("not json");
        let mut args = args_for(graph.path());
        args.options = Some(options.path().to_path_buf());

        let err = render(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse layout options"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["graphview", "g.json", "--format", "json", "--zoom", "2"]);
        assert_eq!(args.format, Format::Json);
        assert_eq!(args.zoom, Some(2.0));
        assert_eq!(args.graph, PathBuf::from("g.json"));
    }
}
