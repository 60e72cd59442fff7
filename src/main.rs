fn main() {
    std::process::exit(subtrack_lib::run());
}
