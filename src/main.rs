fn main() -> anyhow::Result<()> {
    mimicd::cli::run()
}
