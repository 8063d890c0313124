use std::path::Path;
use std::process::Command;

// Runs the client script against tests/client/grid_client.js, skipped where node is missing.
#[test]
fn client_script_filters_and_sorts_like_the_grid_model() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let output = match Command::new("node")
        .arg(root.join("tests").join("client").join("grid_client.js"))
        .arg(root.join("assets").join("grid.js"))
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            eprintln!("skipping client script checks, node is not available: {e}");
            return;
        }
    };

    assert!(
        output.status.success(),
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
