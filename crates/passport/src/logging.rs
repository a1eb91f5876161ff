/// Installs `env_logger` as the `log` backend. `RUST_LOG` takes precedence over the defaults.
///
/// Safe to call more than once, only the first call installs a logger.
pub fn init_logger(dev: bool) {
  const DEFAULT: &str = "info,tower_http=warn";

  let _ = env_logger::Builder::from_env(if dev {
    env_logger::Env::new().default_filter_or(format!("{DEFAULT},trailbase_passport=debug"))
  } else {
    env_logger::Env::new().default_filter_or(DEFAULT)
  })
  .format_timestamp_micros()
  .try_init();
}
