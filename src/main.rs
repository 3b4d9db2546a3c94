fn main() -> std::process::ExitCode {
    tribes_launcher_lib::run()
}
