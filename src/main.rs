fn main() -> std::process::ExitCode {
    paydesk_lib::run()
}
