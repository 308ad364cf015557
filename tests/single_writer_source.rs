use std::fs;
use std::path::Path;

fn non_test_source(file: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(file);
    let src = fs::read_to_string(path).expect("failed to read source");
    match src.find("#[cfg(test)]") {
        Some(idx) => src[..idx].to_string(),
        None => src,
    }
}

/// The run-wide accumulator has exactly one writer: the consumer monitor.
#[test]
fn accumulator_has_a_single_call_site() {
    let src = non_test_source("supervisor.rs");
    assert_eq!(
        src.matches(".accumulate(").count(),
        1,
        "only the consumer monitor may call CompletionState::accumulate"
    );
    assert!(
        !src.contains("pub fn accumulate"),
        "accumulate must stay private to the supervisor"
    );
}

/// Nothing outside the supervisor can reach the accumulator's writer.
#[test]
fn no_other_module_writes_the_accumulator() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for entry in fs::read_dir(dir).expect("failed to list src") {
        let path = entry.expect("dir entry").path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        if name == "supervisor.rs" || !name.ends_with(".rs") {
            continue;
        }
        let src = non_test_source(&name);
        assert!(
            !src.contains(".accumulate(") && !src.contains("data_adder.set("),
            "{} writes the accumulator",
            name
        );
    }
}
