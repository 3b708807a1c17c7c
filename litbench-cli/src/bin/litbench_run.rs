//! Configure, build and run one labelled LLVM test-suite configuration.

fn main() -> anyhow::Result<()> {
    litbench_cli::run_benchmark()
}
