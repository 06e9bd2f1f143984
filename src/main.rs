// ==========================================
// 表格数据导入系统 - 命令行入口
// ==========================================
// rowshift load <file> --schema models.json --model Shop::Project [--dry-run]
// rowshift template <out.csv> --schema models.json --model Shop::Project [--with-associations]
// ==========================================

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rowshift::config::{ConfigManager, LoadOptions};
use rowshift::domain::{LoadReport, OperatorKind, SchemaRegistry};
use rowshift::importer::{Loader, TemplateGenerator, TemplateOptions};
use rowshift::repository::{MemoryStore, PersistenceBackend, SqliteStore};
use rowshift::{logging, APP_NAME, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rowshift")]
#[command(version, about = "表格数据导入: 表头映射到模型字段与关联,逐行导入", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 导入 CSV / Excel 文件
    Load {
        /// 输入文件 (.csv / .xlsx / .xls)
        input: PathBuf,

        /// 模型描述文件 (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// 目标模型限定名
        #[arg(short, long)]
        model: String,

        /// SQLite 数据库路径（默认: 用户数据目录）
        #[arg(long)]
        db: Option<PathBuf>,

        /// 使用内存存储（不落盘）
        #[arg(long, conflicts_with = "db")]
        memory: bool,

        /// 运行选项文件 (JSON)
        #[arg(long)]
        options: Option<PathBuf>,

        /// 试运行: 处理全部行后回滚
        #[arg(long)]
        dry_run: bool,

        /// 必填列（逗号分隔）
        #[arg(long, value_delimiter = ',')]
        mandatory: Vec<String>,

        /// 强制映射列（逗号分隔）
        #[arg(long = "force", value_delimiter = ',')]
        force_inclusion: Vec<String>,

        /// 强制映射全部列
        #[arg(long)]
        include_all: bool,

        /// 无法映射的列视为错误
        #[arg(long)]
        strict: bool,

        /// 失败行输出到 stderr
        #[arg(short, long)]
        verbose: bool,

        /// 导入报告输出文件 (JSON)
        #[arg(long)]
        report_json: Option<PathBuf>,
    },

    /// 生成导入模板（仅表头行）
    Template {
        /// 输出 CSV 文件
        output: PathBuf,

        /// 模型描述文件 (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// 目标模型限定名
        #[arg(short, long)]
        model: String,

        /// 包含关联列
        #[arg(long)]
        with_associations: bool,

        /// 排除的关联类型（逗号分隔: belongs_to,has_one,has_many）
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// 排除的列（逗号分隔）
        #[arg(long, value_delimiter = ',')]
        remove: Vec<String>,

        /// 排除 id / created_at / updated_at
        #[arg(long)]
        remove_system_fields: bool,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init();
    info!("{} v{}", APP_NAME, VERSION);

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            input,
            schema,
            model,
            db,
            memory,
            options,
            dry_run,
            mandatory,
            force_inclusion,
            include_all,
            strict,
            verbose,
            report_json,
        } => {
            let registry = Arc::new(load_registry(&schema)?);

            let mut load_options = match options {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("无法读取运行选项文件: {}", path.display()))?;
                    serde_json::from_str::<LoadOptions>(&raw)
                        .with_context(|| format!("运行选项文件格式错误: {}", path.display()))?
                }
                None => LoadOptions::default(),
            };

            let report = if memory {
                apply_flags(
                    &mut load_options,
                    dry_run,
                    mandatory,
                    force_inclusion,
                    include_all,
                    strict,
                    verbose,
                );
                let backend = MemoryStore::new(Arc::clone(&registry));
                run_load(backend, registry, &model, &input, &load_options)?
            } else {
                let db_path = match db {
                    Some(path) => path,
                    None => default_db_path()?,
                };
                let db_path = db_path.to_string_lossy().to_string();
                info!(db = %db_path, "使用数据库");

                let backend = SqliteStore::new(&db_path, Arc::clone(&registry))?;
                let config = ConfigManager::from_connection(backend.connection())
                    .map_err(|e| anyhow!("配置初始化失败: {}", e))?;
                load_options.apply_config(&config, &model)?;
                // 命令行开关优先于 config_kv
                apply_flags(
                    &mut load_options,
                    dry_run,
                    mandatory,
                    force_inclusion,
                    include_all,
                    strict,
                    verbose,
                );
                run_load(backend, registry, &model, &input, &load_options)?
            };

            if let Some(path) = report_json {
                fs::write(&path, serde_json::to_string_pretty(&report)?)
                    .with_context(|| format!("无法写入报告: {}", path.display()))?;
                info!(file = %path.display(), "导入报告已写出");
            }
        }

        Commands::Template {
            output,
            schema,
            model,
            with_associations,
            exclude,
            remove,
            remove_system_fields,
        } => {
            let registry = load_registry(&schema)?;
            let target = registry
                .get(&model)
                .ok_or_else(|| anyhow!("未注册的模型: {}", model))?;

            let exclude_kinds = exclude
                .iter()
                .map(|k| k.parse::<OperatorKind>().map_err(|e| anyhow!("不支持的操作符类型: {}", e)))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let options = TemplateOptions {
                with_associations,
                exclude_kinds,
                remove,
                remove_system_fields,
            };
            let headers = TemplateGenerator::write_csv(&output, &target, &options)?;
            println!("{}", headers.join(","));
        }
    }

    Ok(())
}

fn run_load<B: PersistenceBackend>(
    backend: B,
    registry: Arc<SchemaRegistry>,
    model: &str,
    input: &Path,
    options: &LoadOptions,
) -> anyhow::Result<LoadReport> {
    let mut loader = Loader::new(backend, registry, model)?;
    let result = loader.perform_load(input, options);

    // 致命错误时报告同样已定稿
    println!("{}", loader.reporter().render());
    Ok(result?)
}

fn apply_flags(
    options: &mut LoadOptions,
    dry_run: bool,
    mandatory: Vec<String>,
    force_inclusion: Vec<String>,
    include_all: bool,
    strict: bool,
    verbose: bool,
) {
    options.dummy_run |= dry_run;
    options.include_all |= include_all;
    options.strict |= strict;
    options.verbose |= verbose;
    options.mandatory.extend(mandatory);
    options.force_inclusion.extend(force_inclusion);
}

fn load_registry(path: &Path) -> anyhow::Result<SchemaRegistry> {
    SchemaRegistry::from_json_file(path)
        .map_err(|e| anyhow!("无法加载模型描述 {}: {}", path.display(), e))
}

/// 默认数据库路径
///
/// - ROWSHIFT_DB_PATH 环境变量优先
/// - 否则使用用户数据目录下的 rowshift/rowshift.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("ROWSHIFT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let dir = dirs::data_dir()
        .map(|d| d.join("rowshift"))
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).with_context(|| format!("无法创建数据目录: {}", dir.display()))?;
    Ok(dir.join("rowshift.db"))
}
