fn main() -> std::process::ExitCode {
    wikichat_lib::run()
}
