fn main() -> Result<(), Box<dyn std::error::Error>> {
    codex_chat::cli::main()
}
