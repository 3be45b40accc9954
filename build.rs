fn main() {
    // Only the firmware build needs the ESP-IDF environment
    #[cfg(feature = "esp")]
    embuild::espidf::sysenv::output();
}
