//! 访客 User-Agent 解析
//!
//! 只识别 CRM 展示所需的操作系统与浏览器名称、版本。

/// 解析结果，格式为 `"<名称> <版本>"`，无版本时只有名称
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub os: Option<String>,
    pub browser: Option<String>,
}

pub trait UserAgentInspector: Send + Sync {
    fn inspect(&self, user_agent: &str) -> UserAgentInfo;
}

/// 基于关键字的解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordUserAgentInspector;

// 顺序敏感：Edge/Opera 的 UA 同时包含 Chrome 与 Safari
const BROWSER_TOKENS: &[(&str, &str)] = &[
    ("Edg/", "Edge"),
    ("Edge/", "Edge"),
    ("OPR/", "Opera"),
    ("Firefox/", "Firefox"),
    ("CriOS/", "Chrome"),
    ("Chrome/", "Chrome"),
    ("Version/", "Safari"),
];

impl UserAgentInspector for KeywordUserAgentInspector {
    fn inspect(&self, user_agent: &str) -> UserAgentInfo {
        UserAgentInfo {
            os: detect_os(user_agent),
            browser: detect_browser(user_agent),
        }
    }
}

fn join(name: &str, version: Option<String>) -> String {
    match version {
        Some(version) if !version.is_empty() => format!("{name} {version}"),
        _ => name.to_string(),
    }
}

/// 读取 `token` 之后直到分隔符的版本号
fn version_after(user_agent: &str, token: &str) -> Option<String> {
    let start = user_agent.find(token)? + token.len();
    let version: String = user_agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect();
    Some(version.replace('_', "."))
}

fn detect_browser(user_agent: &str) -> Option<String> {
    BROWSER_TOKENS
        .iter()
        .find(|(token, _)| user_agent.contains(token))
        .map(|(token, name)| join(name, version_after(user_agent, token)))
}

fn detect_os(user_agent: &str) -> Option<String> {
    if let Some(nt) = version_after(user_agent, "Windows NT ") {
        let release = match nt.as_str() {
            "10.0" => "10",
            "6.3" => "8.1",
            "6.2" => "8",
            "6.1" => "7",
            other => other,
        };
        return Some(join("Windows", Some(release.to_string())));
    }
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        return Some(join("iOS", version_after(user_agent, "OS ")));
    }
    if user_agent.contains("Android") {
        return Some(join("Android", version_after(user_agent, "Android ")));
    }
    if user_agent.contains("Mac OS X") {
        return Some(join("Mac OS", version_after(user_agent, "Mac OS X ")));
    }
    if user_agent.contains("CrOS") {
        return Some("Chromium OS".to_string());
    }
    if user_agent.contains("Linux") {
        return Some("Linux".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect(ua: &str) -> UserAgentInfo {
        KeywordUserAgentInspector.inspect(ua)
    }

    #[test]
    fn desktop_chrome_on_windows() {
        let info = inspect(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36",
        );
        assert_eq!(info.os.as_deref(), Some("Windows 10"));
        assert_eq!(info.browser.as_deref(), Some("Chrome 120.0.6099.109"));
    }

    #[test]
    fn safari_on_mac() {
        let info = inspect(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        );
        assert_eq!(info.os.as_deref(), Some("Mac OS 10.15.7"));
        assert_eq!(info.browser.as_deref(), Some("Safari 17.1"));
    }

    #[test]
    fn edge_wins_over_chrome() {
        let info = inspect(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0.2210.61",
        );
        assert_eq!(info.os.as_deref(), Some("Linux"));
        assert_eq!(info.browser.as_deref(), Some("Edge 120.0.2210.61"));
    }

    #[test]
    fn iphone_and_android() {
        let ios = inspect(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(ios.os.as_deref(), Some("iOS 17.1"));

        let android = inspect(
            "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0 Mobile Safari/537.36",
        );
        assert_eq!(android.os.as_deref(), Some("Android 13"));
        assert_eq!(android.browser.as_deref(), Some("Chrome 119.0"));
    }

    #[test]
    fn unknown_agent_yields_nothing() {
        assert_eq!(inspect("curl/8.0"), UserAgentInfo::default());
    }
}
