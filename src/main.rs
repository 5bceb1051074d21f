fn main() -> anyhow::Result<()> {
    forumd::cli::run_cli()
}
