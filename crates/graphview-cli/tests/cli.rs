use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn graph_file() -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(
        br#"{
            "nodes": [
                { "id": 1, "label": "load" },
                { "id": 2, "label": "store" }
            ],
            "edges": [{ "id": 1, "source": 1, "target": 2, "label": "write" }]
        }"#,
    )?;
    Ok(file)
}

#[test]
fn test_binary_prints_svg() -> anyhow::Result<()> {
    let graph = graph_file()?;
    let output = Command::new(env!("CARGO_BIN_EXE_graphview"))
        .arg(graph.path())
        .arg("--zoom")
        .arg("1.5")
        .env("RUST_LOG", "debug")
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains(">write</text>"));
    assert!(stdout.contains("matrix(1.5 "));
    // Logs stay off stdout.
    assert!(!stdout.contains("Bound new graph"));
    Ok(())
}

#[test]
fn test_binary_fails_on_missing_graph() -> anyhow::Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_graphview"))
        .arg("/nonexistent/graph.json")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Failed to read graph"));
    Ok(())
}
