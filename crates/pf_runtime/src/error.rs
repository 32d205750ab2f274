// crates/pf_runtime/src/error.rs

//! 运行时错误类型
//!
//! 标量转换与缓冲区长度错误。

use std::fmt;

/// 运行时错误
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// 缓冲区大小不匹配
    BufferSizeMismatch {
        /// 缓冲区名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },
    /// 数值错误（NaN/Inf）
    NumericalError {
        /// 错误描述
        message: String,
    },
    /// 配置转换错误
    ConfigConversionError {
        /// 字段名
        field: String,
        /// 原始值
        value: f64,
    },
}

impl RuntimeError {
    /// 构造配置转换错误
    pub fn conversion(field: impl Into<String>, value: f64) -> Self {
        Self::ConfigConversionError { field: field.into(), value }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferSizeMismatch { name, expected, actual } => {
                write!(f, "缓冲区 '{}' 大小不匹配: 期望 {}, 实际 {}", name, expected, actual)
            }
            Self::NumericalError { message } => {
                write!(f, "数值错误: {}", message)
            }
            Self::ConfigConversionError { field, value } => {
                write!(f, "配置转换失败: {} = {} 无法转换", field, value)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// 运行时结果类型
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// 检查缓冲区长度
pub fn check_len(name: &'static str, expected: usize, actual: usize) -> RuntimeResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RuntimeError::BufferSizeMismatch { name, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_len() {
        assert!(check_len("rhs", 4, 4).is_ok());
        let err = check_len("rhs", 4, 3).unwrap_err();
        assert!(err.to_string().contains("rhs"));
    }
}
