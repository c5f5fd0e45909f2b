use thiserror::Error;

/// 批处理存储错误类型定义
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("无效的参数: {0}")]
    InvalidArgument(String),

    #[error("未知的作业阶段: {0}")]
    UnknownStage(String),

    #[error("未知的作业状态: {0}")]
    UnknownJobState(String),

    #[error("数据完整性错误: {0}")]
    Integrity(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl BatchError {
    pub fn query_error<S: Into<String>>(context: S, source: sqlx::Error) -> Self {
        Self::Query {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn integrity<S: Into<String>>(msg: S) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// The underlying driver error, if this error came from the backend.
    pub fn sqlx_error(&self) -> Option<&sqlx::Error> {
        match self {
            BatchError::Database(err) | BatchError::Query { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Backend failures: the caller may resubmit the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BatchError::Database(_) | BatchError::Query { .. }
        )
    }

    /// Caller bugs: wrong arguments, unknown tokens. Never retried.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidArgument(_)
                | BatchError::UnknownStage(_)
                | BatchError::UnknownJobState(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::Internal(_) | BatchError::Configuration(_) | BatchError::Integrity(_)
        )
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(err: serde_json::Error) -> Self {
        BatchError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for BatchError {
    fn from(err: anyhow::Error) -> Self {
        BatchError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_display() {
        let err = BatchError::invalid_argument("查询作业时投影列不能为空");
        assert_eq!(err.to_string(), "无效的参数: 查询作业时投影列不能为空");

        let err = BatchError::UnknownStage("setup".to_string());
        assert_eq!(err.to_string(), "未知的作业阶段: setup");

        let err = BatchError::query_error("更新作业失败", sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("更新作业失败: "));
    }

    #[test]
    fn test_error_classification() {
        assert!(BatchError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(BatchError::query_error("查询", sqlx::Error::PoolClosed).is_retryable());
        assert!(!BatchError::invalid_argument("empty projection").is_retryable());

        assert!(BatchError::UnknownStage("x".into()).is_contract_violation());
        assert!(BatchError::invalid_argument("x").is_contract_violation());
        assert!(!BatchError::integrity("two rows").is_contract_violation());

        assert!(BatchError::integrity("two rows").is_fatal());
        assert!(!BatchError::UnknownJobState("Done".into()).is_fatal());
    }

    #[test]
    fn test_sqlx_error_access() {
        let err = BatchError::query_error("查询", sqlx::Error::RowNotFound);
        assert!(matches!(err.sqlx_error(), Some(sqlx::Error::RowNotFound)));
        assert!(BatchError::Internal("boom".into()).sqlx_error().is_none());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: BatchError = json_err.into();
        assert!(matches!(err, BatchError::Serialization(_)));
    }
}
