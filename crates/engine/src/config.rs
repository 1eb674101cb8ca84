//! 평가 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`EngineConfig`](logward_core::config::EngineConfig)를
//! 기반으로 평가 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logward_core::config::LogwardConfig;
//! use logward_engine::config::PipelineConfig;
//!
//! let core_config = LogwardConfig::default();
//! let config = PipelineConfig::from_core(&core_config.engine);
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logward_core::config::EngineConfig;

use crate::error::EngineError;

/// 최대 워커 수
const MAX_WORKERS: usize = 256;
/// 최대 채널 용량
const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// 평가 파이프라인 설정
///
/// 파이프라인이 실제로 읽는 값만 담습니다. 사전 필터와 정규식 크기 제한은
/// 규칙 저장소를 만들 때 [`RuleStoreBuilder`](crate::rule::RuleStoreBuilder)가 적용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 평가 워커 수 (0 = CPU 코어 수, 1 = 결정적 출력 순서)
    pub workers: usize,
    /// 레코드/알림 채널 용량
    pub channel_capacity: usize,
    /// 실행 시간 제한 (초, 0 = 제한 없음)
    pub run_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&EngineConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `EngineConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &EngineConfig) -> Self {
        Self {
            workers: core.workers,
            channel_capacity: core.channel_capacity,
            run_timeout_secs: core.run_timeout_secs,
        }
    }

    /// 실제로 실행할 워커 수를 반환합니다.
    ///
    /// `workers`가 0이면 사용 가능한 병렬성(CPU 코어 수)을 사용합니다.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// 실행 시간 제한
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.workers > MAX_WORKERS {
            return Err(EngineError::Config {
                field: "workers".to_owned(),
                reason: format!("must be 0-{MAX_WORKERS}"),
            });
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(EngineError::Config {
                field: "channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = EngineConfig {
            prefilter: false,
            workers: 4,
            channel_capacity: 64,
            run_timeout_secs: 30,
            ..Default::default()
        };
        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.workers, 4);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_workers_resolves_to_available_parallelism() {
        let config = PipelineConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.effective_workers() >= 1);

        let config = PipelineConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 3);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config = PipelineConfig {
            run_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.run_timeout(), None);
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let config = PipelineConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_too_many_workers() {
        let config = PipelineConfig {
            workers: 10_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn serialized_config_carries_only_pipeline_settings() {
        let value = serde_json::to_value(PipelineConfig::default()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["channel_capacity", "run_timeout_secs", "workers"]);
    }
}
