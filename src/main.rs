use stratum::{RendererConfig, run};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(RendererConfig::from_env()) {
        log::error!("Event loop failed: {e}");
        std::process::exit(1);
    }
}
