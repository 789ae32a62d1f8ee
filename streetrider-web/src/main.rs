#[cfg(not(target_arch = "wasm32"))]
fn init_logger() {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
        return;
    }
    Builder::new()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Warn)
        .filter_module("streetrider_core", LevelFilter::Debug)
        .filter_module("streetrider_web_lib", LevelFilter::Debug)
        .init();
}

#[cfg(target_arch = "wasm32")]
fn init_logger() {}

#[macroquad::main("Street Rider")]
async fn main() {
    init_logger();
    streetrider_web_lib::run().await;
}
