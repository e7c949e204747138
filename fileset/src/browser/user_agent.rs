//! Minimal User-Agent parsing: browser family, version and OS family.

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

/// Browser identity extracted from a User-Agent header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    pub name: String,
    pub version: String,
    pub os: String,
}

impl UserAgent {
    pub fn parse(user_agent: &str) -> Self {
        let (name, version) = parse_browser(user_agent);
        Self {
            name: name.to_string(),
            version,
            os: parse_os(user_agent).to_string(),
        }
    }
}

/// Token following `marker`, up to the next separator.
fn token_after<'a>(user_agent: &'a str, marker: &str) -> Option<&'a str> {
    let start = user_agent.find(marker)? + marker.len();
    let rest = &user_agent[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, ';' | '(' | ')'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_browser(ua: &str) -> (&'static str, String) {
    // Order matters: Chrome and Android report Safari, newer Opera reports
    // its real version after `Version/`.
    let (name, version) = if ua.contains("Opera") {
        (
            "Opera",
            token_after(ua, "Version/").or_else(|| token_after(ua, "Opera/")),
        )
    } else if ua.contains("MSIE ") {
        ("Microsoft Internet Explorer", token_after(ua, "MSIE "))
    } else if ua.contains("Konqueror/") {
        ("Konqueror", token_after(ua, "Konqueror/"))
    } else if ua.contains("Chrome/") {
        ("Chrome", token_after(ua, "Chrome/"))
    } else if ua.contains("Firefox/") {
        ("Firefox", token_after(ua, "Firefox/"))
    } else if ua.contains("Safari/") {
        (
            "Safari",
            token_after(ua, "Version/").or_else(|| token_after(ua, "Safari/")),
        )
    } else {
        (UNKNOWN, None)
    };
    (name, version.unwrap_or(UNKNOWN).to_string())
}

fn parse_os(ua: &str) -> &'static str {
    if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iPhone OS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("Macintosh") || ua.contains("Mac OS") {
        "Mac OS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US) \
        AppleWebKit/530.5 (KHTML, like Gecko) Chrome/2.0.172.31 Safari/530.5";
    const FIREFOX_LINUX: &str = "Mozilla/5.0 (X11; U; Linux x86_64; en-US; rv:1.9.0.10) \
        Gecko/2009042513 Ubuntu/8.04 (hardy) Firefox/3.0.10";
    const SAFARI_MACOS: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_5_7; en-us) \
        AppleWebKit/528.16 (KHTML, like Gecko) Version/4.0 Safari/528.16";
    const IE_WINDOWS: &str = "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1; InfoPath.2)";
    const OPERA_OLD_LINUX: &str = "Opera/9.64 (X11; Linux x86_64; U; pl) Presto/2.1.1";
    const OPERA_NEW_WINDOWS: &str =
        "Opera/9.80 (Windows NT 6.0; U; en) Presto/2.8.99 Version/11.10";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; U; CPU iPhone OS 3_1_2 like Mac OS X; \
        en-us) AppleWebKit/528.18 (KHTML, like Gecko) Version/4.0 Mobile/7D11 Safari/528.16";
    const SAFARI_ANDROID: &str = "Mozilla/5.0 (Linux; U; Android 2.2.1; en-us; Nexus One \
        Build/FRG83) AppleWebKit/533.1 (KHTML, like Gecko) Version/4.0 Mobile Safari/533.1";
    const KONQUEROR: &str = "Mozilla/5.0 (compatible; Konqueror/4.4; Linux) KHTML/4.4.5 (like Gecko)";

    fn parsed(ua: &str) -> (String, String, String) {
        let agent = UserAgent::parse(ua);
        (agent.name, agent.version, agent.os)
    }

    fn expected(name: &str, version: &str, os: &str) -> (String, String, String) {
        (name.to_string(), version.to_string(), os.to_string())
    }

    #[test]
    fn parses_common_browsers() {
        assert_eq!(parsed(CHROME_WINDOWS), expected("Chrome", "2.0.172.31", "Windows"));
        assert_eq!(parsed(FIREFOX_LINUX), expected("Firefox", "3.0.10", "Linux"));
        assert_eq!(parsed(SAFARI_MACOS), expected("Safari", "4.0", "Mac OS"));
        assert_eq!(
            parsed(IE_WINDOWS),
            expected("Microsoft Internet Explorer", "7.0", "Windows")
        );
        assert_eq!(parsed(KONQUEROR), expected("Konqueror", "4.4", "Linux"));
    }

    #[test]
    fn parses_old_and_new_opera_versions() {
        assert_eq!(parsed(OPERA_OLD_LINUX), expected("Opera", "9.64", "Linux"));
        assert_eq!(parsed(OPERA_NEW_WINDOWS), expected("Opera", "11.10", "Windows"));
    }

    #[test]
    fn parses_mobile_platforms() {
        assert_eq!(parsed(SAFARI_IPHONE), expected("Safari", "4.0", "iPhone OS"));
        assert_eq!(parsed(SAFARI_ANDROID), expected("Safari", "4.0", "Android"));
    }

    #[test]
    fn unknown_agent() {
        assert_eq!(parsed("curl/8.0"), expected(UNKNOWN, UNKNOWN, UNKNOWN));
    }
}
