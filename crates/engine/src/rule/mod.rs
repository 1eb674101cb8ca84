//! 탐지 규칙 -- 로딩, 컴파일, 매칭
//!
//! 규칙은 하나 이상의 정규식 패턴을 가지며, 로그 라인에 대해
//! 대소문자를 무시하고 "어딘가에 등장하는지"로 평가됩니다.
//! 한 규칙의 패턴 여러 개가 동시에 매칭되면 패턴마다 별도의 매칭으로 보고됩니다.
//!
//! # 아키텍처
//! - [`loader`]: XML/YAML 규칙 파일 로딩 및 유효성 검증
//! - [`store`]: 불변 규칙 저장소와 컴파일된 패턴 테이블
//! - [`prefilter`]: 필수 리터럴 기반 후보 패턴 사전 필터
//! - [`matcher`]: 라인 단위 매칭 열거

pub mod loader;
pub mod matcher;
pub mod prefilter;
pub mod store;

pub use loader::RuleLoader;
pub use matcher::{Matches, PatternHit, PatternMatcher};
pub use prefilter::{Candidates, LiteralIndex};
pub use store::{CompiledRule, RuleStore, RuleStoreBuilder};
