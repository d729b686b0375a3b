//! Site-activity proxy server.
//!
//! Usage: `SITE_ACTIVITY_API_KEY=... site-activity-proxy`
//! Optional config at ~/.site-activity/config.json.

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match site_activity_lib::state::load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(site_activity_lib::run(config)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
