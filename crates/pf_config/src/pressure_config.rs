// crates/pf_config/src/pressure_config.rs

//! PressureSolverConfig - 压力求解器配置（全 f64）
//!
//! JSON 配置文件的结构定义。数值一律以 f64/usize 存储，构建求解器时
//! 按 [`Precision`] 转换到目标精度。
//!
//! ```json
//! {
//!   "precision": "f64",
//!   "solver": { "kind": "conjugate_gradient", "accuracy": 1e-5, "max_iterations": 2000 },
//!   "domain": { "resolution": [64, 64], "boundaries": "open" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::boundary::BoundaryMode;
use crate::error::ConfigError;
use crate::precision::Precision;

// =============================================================================
// 数字或关键字字面量
// =============================================================================

/// 配置中"数字或关键字"字段的序列化形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigLiteral {
    /// 非负整数
    Integer(u64),
    /// 浮点数
    Number(f64),
    /// 关键字（如 "same"、"mirror"）
    Keyword(String),
}

impl fmt::Display for ConfigLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Number(v) => write!(f, "{}", v),
            Self::Keyword(s) => write!(f, "'{}'", s),
        }
    }
}

// =============================================================================
// 反向求解参数
// =============================================================================

/// 反向求解的容差
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ConfigLiteral", into = "ConfigLiteral")]
pub enum GradientAccuracy {
    /// 与正向 `accuracy` 相同
    #[default]
    Same,
    /// 独立容差
    Value(f64),
}

impl TryFrom<ConfigLiteral> for GradientAccuracy {
    type Error = ConfigError;

    fn try_from(lit: ConfigLiteral) -> Result<Self, Self::Error> {
        match lit {
            ConfigLiteral::Integer(v) => Ok(Self::Value(v as f64)),
            ConfigLiteral::Number(v) => Ok(Self::Value(v)),
            ConfigLiteral::Keyword(s) => s.parse(),
        }
    }
}

impl From<GradientAccuracy> for ConfigLiteral {
    fn from(acc: GradientAccuracy) -> Self {
        match acc {
            GradientAccuracy::Same => Self::Keyword("same".into()),
            GradientAccuracy::Value(v) => Self::Number(v),
        }
    }
}

impl FromStr for GradientAccuracy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("same") {
            return Ok(Self::Same);
        }
        s.parse::<f64>()
            .map(Self::Value)
            .map_err(|_| ConfigError::invalid("gradient_accuracy", s, "期望数值或 'same'"))
    }
}

/// 反向求解的迭代上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ConfigLiteral", into = "ConfigLiteral")]
pub enum GradientIterations {
    /// 与正向 `max_iterations` 相同
    #[default]
    Same,
    /// 使用本次正向求解实际执行的迭代次数
    Mirror,
    /// 固定上限
    Fixed(usize),
}

impl TryFrom<ConfigLiteral> for GradientIterations {
    type Error = ConfigError;

    fn try_from(lit: ConfigLiteral) -> Result<Self, Self::Error> {
        match lit {
            ConfigLiteral::Integer(v) => Ok(Self::Fixed(v as usize)),
            ConfigLiteral::Number(v) => Err(ConfigError::invalid(
                "max_gradient_iterations",
                v,
                "必须为非负整数",
            )),
            ConfigLiteral::Keyword(s) => s.parse(),
        }
    }
}

impl From<GradientIterations> for ConfigLiteral {
    fn from(it: GradientIterations) -> Self {
        match it {
            GradientIterations::Same => Self::Keyword("same".into()),
            GradientIterations::Mirror => Self::Keyword("mirror".into()),
            GradientIterations::Fixed(n) => Self::Integer(n as u64),
        }
    }
}

impl FromStr for GradientIterations {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "same" => Ok(Self::Same),
            "mirror" => Ok(Self::Mirror),
            other => other.parse::<usize>().map(Self::Fixed).map_err(|_| {
                ConfigError::invalid(
                    "max_gradient_iterations",
                    s,
                    "期望非负整数、'same' 或 'mirror'",
                )
            }),
        }
    }
}

/// CG 线性算子的表示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    /// 组装稀疏矩阵
    #[default]
    Sparse,
    /// 直接由掩码计算模板，不组装矩阵
    MatrixFree,
}

// =============================================================================
// CG 配置
// =============================================================================

/// 共轭梯度求解器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgConfig {
    /// 收敛容差（全批次残差无穷范数）
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,

    /// 反向求解容差
    #[serde(default)]
    pub gradient_accuracy: GradientAccuracy,

    /// 正向迭代上限，`null` 表示不设上限
    #[serde(default = "default_max_iterations")]
    pub max_iterations: Option<usize>,

    /// 反向迭代上限
    #[serde(default)]
    pub max_gradient_iterations: GradientIterations,

    /// 反向传播是否展开正向迭代
    #[serde(default)]
    pub autodiff: bool,

    /// 线性算子表示
    #[serde(default)]
    pub operator: OperatorKind,
}

fn default_accuracy() -> f64 {
    1e-5
}

fn default_max_iterations() -> Option<usize> {
    Some(2000)
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            accuracy: default_accuracy(),
            gradient_accuracy: GradientAccuracy::default(),
            max_iterations: default_max_iterations(),
            max_gradient_iterations: GradientIterations::default(),
            autodiff: false,
            operator: OperatorKind::default(),
        }
    }
}

impl CgConfig {
    /// 以给定容差创建，其余取默认值
    pub fn new(accuracy: f64) -> Self {
        Self { accuracy, ..Self::default() }
    }

    /// 设置正向迭代上限
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// 设置反向容差
    pub fn with_gradient_accuracy(mut self, gradient_accuracy: GradientAccuracy) -> Self {
        self.gradient_accuracy = gradient_accuracy;
        self
    }

    /// 设置反向迭代上限
    pub fn with_max_gradient_iterations(mut self, iterations: GradientIterations) -> Self {
        self.max_gradient_iterations = iterations;
        self
    }

    /// 设置是否展开求导
    pub fn with_autodiff(mut self, autodiff: bool) -> Self {
        self.autodiff = autodiff;
        self
    }

    /// 设置算子表示
    pub fn with_operator(mut self, operator: OperatorKind) -> Self {
        self.operator = operator;
        self
    }

    /// 反向求解实际使用的容差
    pub fn resolved_gradient_accuracy(&self) -> f64 {
        match self.gradient_accuracy {
            GradientAccuracy::Same => self.accuracy,
            GradientAccuracy::Value(v) => v,
        }
    }

    /// 反向求解实际使用的迭代上限
    ///
    /// `forward_iterations` 为同一次正向调用实际执行的迭代次数。
    pub fn gradient_iteration_cap(&self, forward_iterations: usize) -> Option<usize> {
        match self.max_gradient_iterations {
            GradientIterations::Same => self.max_iterations,
            GradientIterations::Mirror => Some(forward_iterations),
            GradientIterations::Fixed(n) => Some(n),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.accuracy.is_finite() || self.accuracy <= 0.0 {
            return Err(ConfigError::invalid(
                "solver.accuracy",
                self.accuracy,
                "容差必须为有限正数",
            ));
        }

        if let GradientAccuracy::Value(v) = self.gradient_accuracy {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::invalid(
                    "solver.gradient_accuracy",
                    v,
                    "容差必须为有限正数",
                ));
            }
        }

        if self.autodiff {
            match self.max_gradient_iterations {
                GradientIterations::Fixed(n) => {
                    return Err(ConfigError::IncompatibleOptions(format!(
                        "max_gradient_iterations = {} 与 autodiff = true 不能同时使用",
                        n
                    )));
                }
                GradientIterations::Mirror => {
                    return Err(ConfigError::IncompatibleOptions(
                        "max_gradient_iterations = 'mirror' 与 autodiff = true 不能同时使用"
                            .to_string(),
                    ));
                }
                GradientIterations::Same => {}
            }
        }

        Ok(())
    }
}

// =============================================================================
// 求解器选择
// =============================================================================

/// 求解器种类及其参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverSettings {
    /// 稀疏直接求解
    Direct,
    /// 共轭梯度
    ConjugateGradient(CgConfig),
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::ConjugateGradient(CgConfig::default())
    }
}

impl SolverSettings {
    /// 种类名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ConjugateGradient(_) => "conjugate_gradient",
        }
    }

    /// 验证参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Direct => Ok(()),
            Self::ConjugateGradient(cg) => cg.validate(),
        }
    }
}

// =============================================================================
// 计算域
// =============================================================================

/// 单轴边界：两侧相同或分别指定 `[lower, upper]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisBoundary {
    /// 两侧相同
    Both(String),
    /// 分别指定下侧、上侧
    Sides([String; 2]),
}

/// 边界说明：全部相同或逐轴指定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundarySpec {
    /// 所有轴所有侧相同
    Uniform(String),
    /// 逐轴
    PerAxis(Vec<AxisBoundary>),
}

impl Default for BoundarySpec {
    fn default() -> Self {
        Self::Uniform("open".to_string())
    }
}

/// 长方体障碍物，半开区间 `[lower, upper)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// 下角（含）
    pub lower: Vec<usize>,
    /// 上角（不含）
    pub upper: Vec<usize>,
}

/// 计算域配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// 各轴单元数
    #[serde(default = "default_resolution")]
    pub resolution: Vec<usize>,

    /// 边界模式
    #[serde(default)]
    pub boundaries: BoundarySpec,

    /// 障碍物
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

fn default_resolution() -> Vec<usize> {
    vec![32, 32]
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            boundaries: BoundarySpec::default(),
            obstacles: Vec::new(),
        }
    }
}

impl DomainConfig {
    /// 以统一边界创建
    pub fn new(resolution: Vec<usize>, boundary: BoundaryMode) -> Self {
        Self {
            resolution,
            boundaries: BoundarySpec::Uniform(boundary.name().to_string()),
            obstacles: Vec::new(),
        }
    }

    /// 空间维数
    pub fn rank(&self) -> usize {
        self.resolution.len()
    }

    /// 单元总数
    pub fn cell_count(&self) -> usize {
        self.resolution.iter().product()
    }

    /// 解析出逐轴 `[lower, upper]` 边界模式
    pub fn boundary_modes(&self) -> Result<Vec<[BoundaryMode; 2]>, ConfigError> {
        match &self.boundaries {
            BoundarySpec::Uniform(s) => {
                let mode: BoundaryMode = s.parse()?;
                Ok(vec![[mode, mode]; self.rank()])
            }
            BoundarySpec::PerAxis(axes) => {
                if axes.len() != self.rank() {
                    return Err(ConfigError::invalid(
                        "domain.boundaries",
                        axes.len(),
                        &format!("轴数必须等于分辨率维数 {}", self.rank()),
                    ));
                }
                axes.iter()
                    .map(|axis| match axis {
                        AxisBoundary::Both(s) => {
                            let mode: BoundaryMode = s.parse()?;
                            Ok([mode, mode])
                        }
                        AxisBoundary::Sides([lo, hi]) => Ok([lo.parse()?, hi.parse()?]),
                    })
                    .collect()
            }
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution.is_empty() {
            return Err(ConfigError::invalid("domain.resolution", "[]", "至少需要一个空间轴"));
        }
        if let Some(axis) = self.resolution.iter().position(|&n| n == 0) {
            return Err(ConfigError::invalid(
                &format!("domain.resolution[{}]", axis),
                0,
                "单元数必须为正",
            ));
        }

        self.boundary_modes()?;

        for (i, obs) in self.obstacles.iter().enumerate() {
            let key = format!("domain.obstacles[{}]", i);
            if obs.lower.len() != self.rank() || obs.upper.len() != self.rank() {
                return Err(ConfigError::invalid(
                    &key,
                    format!("{:?}..{:?}", obs.lower, obs.upper),
                    "角点维数与分辨率不一致",
                ));
            }
            let inside = obs
                .lower
                .iter()
                .zip(&obs.upper)
                .zip(&self.resolution)
                .all(|((&lo, &hi), &n)| lo < hi && hi <= n);
            if !inside {
                return Err(ConfigError::invalid(
                    &key,
                    format!("{:?}..{:?}", obs.lower, obs.upper),
                    "障碍物必须非空且位于计算域内",
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// 顶层配置
// =============================================================================

/// 压力求解器配置（全 f64）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PressureSolverConfig {
    /// 计算精度
    #[serde(default)]
    pub precision: Precision,

    /// 求解器
    #[serde(default)]
    pub solver: SolverSettings,

    /// 计算域
    #[serde(default)]
    pub domain: DomainConfig,
}

impl PressureSolverConfig {
    /// 从 JSON 字符串解析并验证
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: PressureSolverConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver.validate()?;
        self.domain.validate()?;

        if let SolverSettings::ConjugateGradient(cg) = &self.solver {
            let floor = self.precision.accuracy_floor();
            if self.precision.is_f32() && cg.accuracy < floor {
                return Err(ConfigError::invalid(
                    "solver.accuracy",
                    cg.accuracy,
                    &format!("f32 精度下容差不应低于 {:e}", floor),
                ));
            }
        }
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
