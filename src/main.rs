//! # 合影打卡工具 — 命令行入口
//!
//! 本文件只负责参数解析、依赖装配与结果输出。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。
//!
//! 用法：
//!   star-booth compose --photo <REF> [--frame <REF>] [--caption <TEXT>] [--preset <KEY>]...
//!   star-booth history [--clear]
//!   star-booth presets

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use star_booth::db::{self, ExportHistory};
use star_booth::error::AppError;
use star_booth::photo::{
    ExportPreset, ImageKitUploader, PerformanceProfile, PhotoConfig, PhotoHandler, PhotoService,
    PhotoSource, TextColor, TextOverlaySpec, TextPosition,
};
use star_booth::settings::{self, BoothSettings};
use star_booth::storage;

#[derive(Parser)]
#[command(
    name = "star-booth",
    about = "Photo booth compositing and export pipeline",
    version
)]
struct Cli {
    /// Settings file (defaults to $STAR_BOOTH_HOME/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a photo with an optional frame and caption, then export it
    Compose {
        /// Photo reference: file path, http(s) URL or data URI
        #[arg(long)]
        photo: String,

        /// Frame reference: file path, http(s) URL or data URI
        #[arg(long)]
        frame: Option<String>,

        /// Caption text (drawn uppercased)
        #[arg(long, default_value = "")]
        caption: String,

        /// Caption position: top|bottom
        #[arg(long, default_value = "bottom")]
        position: String,

        /// Caption color: white|red
        #[arg(long, default_value = "white")]
        color: String,

        /// Export preset keys (repeatable)
        #[arg(long = "preset", default_value = "original")]
        presets: Vec<String>,

        /// Output directory (defaults to the configured exports directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Font file used for the caption
        #[arg(long)]
        font: Option<PathBuf>,

        /// Performance profile: quality|balanced|speed
        #[arg(long)]
        profile: Option<String>,

        /// Upload every export to ImageKit
        #[arg(long)]
        upload: bool,

        /// Tags attached to uploads
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Uploader id recorded on the photo wall entry
        #[arg(long, default_value = "anonymous")]
        user_id: String,

        /// Uploader display name recorded on the photo wall entry
        #[arg(long, default_value = "Guest")]
        user_name: String,
    },

    /// Show or clear the recent export history
    History {
        /// Remove all history entries
        #[arg(long)]
        clear: bool,
    },

    /// List export presets
    Presets,
}

struct ComposeArgs {
    photo: String,
    frame: Option<String>,
    text: TextOverlaySpec,
    presets: Vec<ExportPreset>,
    output: Option<PathBuf>,
    upload: bool,
    tags: Vec<String>,
    user_id: String,
    user_name: String,
}

fn load_settings(path: Option<PathBuf>) -> Result<BoothSettings, AppError> {
    let path = match path {
        Some(path) => path,
        None => settings::default_settings_path()?,
    };
    Ok(settings::load_settings_from_path(&path))
}

fn open_history(settings: &BoothSettings, limit: usize) -> Result<ExportHistory, AppError> {
    let db_path = match settings.db_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => settings::app_data_dir()?.join("booth.db"),
    };
    Ok(ExportHistory::new(db::init_db(&db_path)?, limit))
}

fn build_service(settings: &BoothSettings, config: PhotoConfig, upload: bool) -> Result<PhotoService, AppError> {
    let history = open_history(settings, config.history_limit)?;
    let service = PhotoService::new(PhotoHandler::new(config)?, history);

    if !upload {
        return Ok(service);
    }

    let imagekit = settings
        .imagekit
        .as_ref()
        .ok_or_else(|| AppError::Settings("设置中缺少 imagekit 配置，无法上传".to_string()))?;
    let uploader = ImageKitUploader::new(imagekit.to_config())?;
    Ok(service.with_uploader(Arc::new(uploader)))
}

async fn run_compose(settings: &BoothSettings, config: PhotoConfig, args: ComposeArgs) -> Result<(), AppError> {
    let service = build_service(settings, config, args.upload)?;

    let photo = PhotoSource::detect(&args.photo);
    let frame = args.frame.as_deref().map(PhotoSource::detect);
    let composite = service.compose(&photo, frame.as_ref(), &args.text).await?;

    let custom_dir = args
        .output
        .map(|dir| dir.to_string_lossy().to_string())
        .or_else(|| settings.output_dir.clone());
    let output_dir = storage::get_exports_dir(&settings::app_data_dir()?, custom_dir.as_deref())?;

    for preset in &args.presets {
        let file = service.export(&composite, preset)?;
        let path = storage::save_export(&output_dir, &file)?;
        println!("{} {}x{} {}", preset.key, file.width, file.height, path.display());

        if args.upload {
            let (media, record) = service
                .upload(&file, &args.text.text, &args.tags, &args.user_id, &args.user_name)
                .await?;
            let record_json = serde_json::to_string_pretty(&record)
                .map_err(|e| AppError::Settings(format!("序列化照片记录失败: {}", e)))?;
            println!("uploaded {}\n{}", media.url, record_json);
        }
    }

    service.shutdown();
    Ok(())
}

fn run_history(settings: &BoothSettings, clear: bool) -> Result<(), AppError> {
    let mut config = PhotoConfig::default();
    settings.apply_to(&mut config)?;
    let history = open_history(settings, config.history_limit)?;

    if clear {
        history.clear()?;
        println!("history cleared");
        return Ok(());
    }

    let entries = history.entries()?;
    println!("{} / {} entries", entries.len(), history.limit());
    for (index, entry) in entries.iter().enumerate() {
        let preview: String = entry.chars().take(64).collect();
        println!("{:>2}. {}… ({} bytes)", index + 1, preview, entry.len());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = load_settings(cli.settings)?;

    match cli.command {
        Commands::Compose {
            photo,
            frame,
            caption,
            position,
            color,
            presets,
            output,
            font,
            profile,
            upload,
            tags,
            user_id,
            user_name,
        } => {
            let mut config = PhotoConfig::default();
            settings.apply_to(&mut config)?;
            if let Some(profile) = profile.as_deref() {
                config.apply_performance_profile(PerformanceProfile::parse(profile)?);
            }
            if font.is_some() {
                config.font_path = font;
            }

            let text = TextOverlaySpec::new(
                caption,
                TextPosition::parse(&position)?,
                TextColor::parse(&color)?,
            );
            let presets = presets
                .iter()
                .map(|key| ExportPreset::by_key(key))
                .collect::<Result<Vec<_>, _>>()?;

            run_compose(
                &settings,
                config,
                ComposeArgs {
                    photo,
                    frame,
                    text,
                    presets,
                    output,
                    upload,
                    tags,
                    user_id,
                    user_name,
                },
            )
            .await
        }
        Commands::History { clear } => run_history(&settings, clear),
        Commands::Presets => {
            for preset in ExportPreset::all() {
                if preset.is_original() {
                    println!("{:<20} {}", preset.key, preset.name);
                } else {
                    println!("{:<20} {} ({}x{})", preset.key, preset.name, preset.width, preset.height);
                }
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(err) = run(cli).await {
        match err.stage() {
            Some(stage) => log::error!("❌ {:?} 阶段失败: {}", stage, err),
            None => log::error!("❌ 执行失败: {}", err),
        }
        std::process::exit(1);
    }
}
