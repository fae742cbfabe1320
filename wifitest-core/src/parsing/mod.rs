//! 纯函数解析器：把外部工具的原始输出转换为结构化记录。
//! 这里不执行任何命令，便于单独测试。

mod link;
mod scan;
mod speedtest;

pub use link::{is_link_activated, parse_active_ssid, parse_interface_name, parse_iw_link};
pub use scan::parse_iw_scan;
pub use speedtest::{parse_iperf3_json, parse_ookla_json};

use thiserror::Error;

/// Why a speed-test payload could not be turned into a result.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object at the top level")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("tool reported an error: {0}")]
    ToolReported(String),
}
