fn main() -> anyhow::Result<()> {
    survey_cli::cli::main()
}
