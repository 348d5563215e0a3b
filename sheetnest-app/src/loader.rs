use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetnest_core::record::EntityRecord;
use sheetnest_engine::errors::EngineError;
use sheetnest_engine::session::NestingSession;
use sheetnest_tessellate::{TessellateError, UnitConversion, Units, tessellate_shape};
use thiserror::Error;
use tracing::{info, warn};

/// 指定排样作业文件的环境变量。
pub const JOB_ENV: &str = "SHEETNEST_JOB";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("读取作业文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析作业文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("形状 `{key}` 细分失败: {source}")]
    Tessellate {
        key: String,
        #[source]
        source: TessellateError,
    },
    #[error(transparent)]
    Session(#[from] EngineError),
}

/// 排样作业：一组带数量与缩放的形状。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub shapes: Vec<JobShape>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobShape {
    pub key: String,
    #[serde(default = "JobShape::default_quantity")]
    pub quantity: usize,
    #[serde(default = "JobShape::default_scale")]
    pub scale: f64,
    #[serde(default = "JobShape::default_mirror")]
    pub mirror: bool,
    /// 图纸 `$INSUNITS` 代码；缺省时使用配置中的默认值。
    #[serde(default)]
    pub insunits: Option<i32>,
    pub entities: Vec<EntityRecord>,
}

impl JobShape {
    fn default_quantity() -> usize {
        1
    }

    fn default_scale() -> f64 {
        1.0
    }

    fn default_mirror() -> bool {
        true
    }

    pub fn new(key: impl Into<String>, entities: Vec<EntityRecord>) -> Self {
        Self {
            key: key.into(),
            quantity: Self::default_quantity(),
            scale: Self::default_scale(),
            mirror: Self::default_mirror(),
            insunits: None,
            entities,
        }
    }

    pub fn with_quantity(mut self, quantity: usize) -> Self {
        self.quantity = quantity;
        self
    }
}

impl Job {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| JobError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 细分全部形状并登记到新的排样会话；任一形状失败则整体失败。
    pub fn build_session(&self, default_insunits: i32) -> Result<NestingSession, JobError> {
        let mut session = NestingSession::new();
        for shape in &self.shapes {
            let units = Units::from_insunits(shape.insunits.unwrap_or(default_insunits));
            let geometry = tessellate_shape(&shape.entities, UnitConversion::from_units(units))
                .map_err(|source| JobError::Tessellate {
                    key: shape.key.clone(),
                    source,
                })?;
            session.add_shape(shape.key.clone(), geometry)?;
            session.set_quantity(&shape.key, shape.quantity)?;
            session.set_display_scale(&shape.key, shape.scale)?;
            session.set_mirror_eligible(&shape.key, shape.mirror)?;
        }
        Ok(session)
    }

    /// 内置示例：带孔底板、腰形槽与三角筋板。
    pub fn demo() -> Self {
        let plate = vec![
            EntityRecord::with_kind("LWPOLYLINE")
                .with(90, 4)
                .with(70, 1)
                .with(10, 0)
                .with(20, 0)
                .with(10, 120)
                .with(20, 0)
                .with(10, 120)
                .with(20, 80)
                .with(10, 0)
                .with(20, 80),
            EntityRecord::with_kind("CIRCLE")
                .with(10, 60)
                .with(20, 40)
                .with(40, 15),
        ];

        let slot = vec![
            EntityRecord::with_kind("LINE")
                .with(10, 0)
                .with(20, 10)
                .with(11, 60)
                .with(21, 10),
            EntityRecord::with_kind("ARC")
                .with(10, 60)
                .with(20, 0)
                .with(40, 10)
                .with(50, 270)
                .with(51, 90),
            EntityRecord::with_kind("LINE")
                .with(10, 60)
                .with(20, -10)
                .with(11, 0)
                .with(21, -10),
            EntityRecord::with_kind("ARC")
                .with(10, 0)
                .with(20, 0)
                .with(40, 10)
                .with(50, 90)
                .with(51, 270),
        ];

        let gusset = vec![
            EntityRecord::with_kind("POLYLINE").with(70, 1),
            EntityRecord::with_kind("VERTEX").with(10, 0).with(20, 0),
            EntityRecord::with_kind("VERTEX").with(10, 50).with(20, 0),
            EntityRecord::with_kind("VERTEX").with(10, 0).with(20, 35),
            EntityRecord::with_kind("SEQEND"),
        ];

        Self {
            shapes: vec![
                JobShape::new("plate", plate).with_quantity(2),
                JobShape::new("slot", slot).with_quantity(4),
                JobShape::new("gusset", gusset).with_quantity(6),
            ],
        }
    }
}

/// 作业来源，便于输出加载信息。
#[derive(Debug, Clone)]
pub enum JobSource {
    File(PathBuf),
    Demo,
}

#[derive(Debug)]
pub struct LoadedJob {
    pub job: Job,
    pub source: JobSource,
}

/// 显式路径读取失败视为错误；环境变量 `SHEETNEST_JOB` 指定的文件读取失败时回退到内置示例。
pub fn load_job(explicit: Option<PathBuf>) -> Result<LoadedJob, JobError> {
    if let Some(path) = explicit {
        let job = Job::from_file(&path)?;
        info!(path = %path.display(), shapes = job.shapes.len(), "已加载作业文件");
        return Ok(LoadedJob {
            job,
            source: JobSource::File(path),
        });
    }

    if let Some(path) = env::var_os(JOB_ENV) {
        let path = PathBuf::from(path);
        match Job::from_file(&path) {
            Ok(job) => {
                info!(path = %path.display(), shapes = job.shapes.len(), "已加载作业文件");
                return Ok(LoadedJob {
                    job,
                    source: JobSource::File(path),
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载作业失败，回退到内置示例");
            }
        }
    }

    Ok(LoadedJob {
        job: Job::demo(),
        source: JobSource::Demo,
    })
}
