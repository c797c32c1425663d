fn main() {
    holdem_cfr::cli::run();
}
