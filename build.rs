fn main() {
    // The ESP-IDF environment only exists for firmware builds; host builds
    // and tests skip it.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "espidf" {
        embuild::espidf::sysenv::output();
    }
}
