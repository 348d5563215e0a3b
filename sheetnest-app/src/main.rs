use std::path::PathBuf;

use sheetnest_config::AppConfig;
use sheetnest_engine::packer::SheetSpec;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod loader;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut mirror_override: Option<bool> = None;
    let mut config_override: Option<PathBuf> = None;
    let mut job_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mirror" => mirror_override = Some(true),
            "--no-mirror" => mirror_override = Some(false),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--job" => {
                let Some(path) = args.next() else {
                    eprintln!("`--job` 需要提供作业文件路径");
                    std::process::exit(1);
                };
                job_override = Some(PathBuf::from(path));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 SheetNest 排样");

    let loaded = match loader::load_job(job_override) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "无法加载排样作业");
            std::process::exit(1);
        }
    };

    let mut session = match loaded.job.build_session(config.tessellation.insunits) {
        Ok(session) => session,
        Err(err) => {
            error!(error = %err, "无法构建排样会话");
            std::process::exit(1);
        }
    };

    let spec = SheetSpec::new(config.sheet.width, config.sheet.height)
        .with_spacing(config.sheet.spacing)
        .with_mirror(mirror_override.unwrap_or(config.sheet.allow_mirror));
    session.pack(&spec);
    cli::print_report(&session, &spec, &loaded.source);
}

/// 显式指定的配置与自动发现的配置都在失败时回退到内建默认值，排样作业照常进行。
fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    loaded.unwrap_or_else(|err| {
        match err.path() {
            Some(path) => {
                warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
            }
            None => warn!(error = %err, "加载配置失败，使用内建默认值"),
        }
        AppConfig::default()
    })
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    let _ = subscriber.try_init();
}
