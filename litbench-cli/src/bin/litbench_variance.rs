//! Repeat a test-suite configuration and report per-benchmark variance.

fn main() -> anyhow::Result<()> {
    litbench_cli::validate_variance()
}
